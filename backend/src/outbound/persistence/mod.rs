//! PostgreSQL persistence adapter using Diesel.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) stay private
//! to this module; the repository translates them to domain types. Failures
//! are mapped to [`ContactRepositoryError`](crate::domain::ports::ContactRepositoryError)
//! variants before they leave the adapter.
//!
//! ```ignore
//! use contact_ledger::outbound::persistence::{DbPool, DieselContactRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/ledger")).await?;
//! let repo = DieselContactRepository::new(pool);
//! ```

mod diesel_contact_repository;
mod diesel_error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_contact_repository::DieselContactRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
