//! Outbound adapters implementing the domain's driven ports.
//!
//! - **persistence**: PostgreSQL via Diesel.
//! - **memory**: in-process store for database-less runs and tests.
//!
//! Adapters translate between domain types and storage representations and
//! hold no ledger logic.

pub mod memory;
pub mod persistence;
