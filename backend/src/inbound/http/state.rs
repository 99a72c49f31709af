//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on the driving port and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::IdentifyCommand;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub identify: Arc<dyn IdentifyCommand>,
}

impl HttpState {
    /// Construct state from the identify use-case.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use contact_ledger::domain::ports::FixtureIdentifyCommand;
    /// use contact_ledger::inbound::http::state::HttpState;
    ///
    /// let state = HttpState::new(Arc::new(FixtureIdentifyCommand));
    /// let _identify = state.identify.clone();
    /// ```
    pub fn new(identify: Arc<dyn IdentifyCommand>) -> Self {
        Self { identify }
    }
}
