//! Contact ledger entry-point: loads settings, prepares the store and serves
//! the REST API.

mod server;

use std::net::SocketAddr;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use contact_ledger::inbound::http::health::HealthState;
use contact_ledger::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use contact_ledger::settings::LedgerSettings;
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = LedgerSettings::load_from_iter(std::env::args_os()).map_err(|e| {
        error!(error = %e, "failed to load settings");
        std::io::Error::other(format!("failed to load settings: {e}"))
    })?;

    let bind_addr: SocketAddr = settings.bind_addr().parse().map_err(|e| {
        error!(bind_addr = settings.bind_addr(), error = %e, "invalid bind address");
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid bind address {}: {e}", settings.bind_addr()),
        )
    })?;

    let mut config =
        ServerConfig::new(bind_addr).with_identify_max_attempts(settings.identify_max_attempts());
    if let Some(database_url) = settings.database_url() {
        config = config.with_db_pool(prepare_database(&settings, database_url).await?);
    }

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), config)?;
    info!(%bind_addr, "contact ledger listening");

    let outcome = server.await;
    health_state.mark_unhealthy();
    info!("contact ledger stopped");
    outcome
}

/// Apply migrations when enabled and build the connection pool.
async fn prepare_database(
    settings: &LedgerSettings,
    database_url: &str,
) -> std::io::Result<DbPool> {
    if settings.run_migrations() {
        let applied = run_pending_migrations(database_url).await.map_err(|e| {
            error!(error = %e, "database migrations failed");
            std::io::Error::other(format!("database migrations failed: {e}"))
        })?;
        info!(applied, "database migrations applied");
    }

    let pool_config = PoolConfig::new(database_url)
        .with_max_size(settings.pool_max_size())
        .with_min_idle(Some(settings.pool_min_idle()))
        .with_connection_timeout(settings.pool_connection_timeout());
    DbPool::new(pool_config).await.map_err(|e| {
        error!(error = %e, "database pool initialisation failed");
        std::io::Error::other(format!("database pool initialisation failed: {e}"))
    })
}
