//! Domain ports for the hexagonal boundary.
//!
//! Driving ports are called by inbound adapters; driven ports are
//! implemented by outbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod contact_repository;
mod identify_command;

#[cfg(test)]
pub use contact_repository::MockContactRepository;
pub use contact_repository::{ContactRepository, ContactRepositoryError};
#[cfg(test)]
pub use identify_command::MockIdentifyCommand;
pub use identify_command::{FixtureIdentifyCommand, IdentifyCommand};
