//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use contact_ledger::domain::DEFAULT_MAX_ATTEMPTS;
use contact_ledger::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) identify_max_attempts: u32,
}

impl ServerConfig {
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            identify_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attach a database connection pool.
    ///
    /// Without one the server keeps contacts in process memory.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Set the identify retry budget.
    #[must_use]
    pub fn with_identify_max_attempts(mut self, attempts: u32) -> Self {
        self.identify_max_attempts = attempts;
        self
    }
}
