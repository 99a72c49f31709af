//! Builders for HTTP state from the configured store.

use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};

use contact_ledger::domain::ContactLedgerService;
use contact_ledger::domain::ports::IdentifyCommand;
use contact_ledger::inbound::http::state::HttpState;
use contact_ledger::outbound::memory::InMemoryContactRepository;
use contact_ledger::outbound::persistence::DieselContactRepository;

use super::ServerConfig;

fn build_identify_command(config: &ServerConfig) -> Arc<dyn IdentifyCommand> {
    match &config.db_pool {
        Some(pool) => {
            info!("contacts stored in PostgreSQL");
            Arc::new(
                ContactLedgerService::new(Arc::new(DieselContactRepository::new(pool.clone())))
                    .with_max_attempts(config.identify_max_attempts),
            )
        }
        None => {
            warn!("no database configured; contacts are kept in memory and lost on restart");
            Arc::new(
                ContactLedgerService::new(Arc::new(InMemoryContactRepository::default()))
                    .with_max_attempts(config.identify_max_attempts),
            )
        }
    }
}

/// Build the shared handler state.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    web::Data::new(HttpState::new(build_identify_command(config)))
}
