//! Driving port for identity reconciliation.
//!
//! Inbound adapters hand a validated [`IdentifyRequest`] to
//! [`IdentifyCommand::identify`] and render the resulting
//! [`ConsolidatedContact`]. They never see individual contact records.

use async_trait::async_trait;

use crate::domain::{ConsolidatedContact, ContactId, Error, IdentifyRequest};

/// Resolve an observation into the consolidated identity it belongs to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentifyCommand: Send + Sync {
    /// Record the observation and return its identity.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` when the store is unreachable or stays
    ///   contended after the configured retries.
    /// - `InternalError` when stored data violates ledger invariants or a
    ///   query fails.
    async fn identify(&self, request: &IdentifyRequest) -> Result<ConsolidatedContact, Error>;
}

/// Fixture implementation for handler tests.
///
/// Echoes the request back as a lone primary with id 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureIdentifyCommand;

#[async_trait]
impl IdentifyCommand for FixtureIdentifyCommand {
    async fn identify(&self, request: &IdentifyRequest) -> Result<ConsolidatedContact, Error> {
        Ok(ConsolidatedContact {
            primary_contact_id: ContactId::new(1),
            emails: request.email().cloned().into_iter().collect(),
            phone_numbers: request.phone_number().cloned().into_iter().collect(),
            secondary_contact_ids: Vec::new(),
        })
    }
}
