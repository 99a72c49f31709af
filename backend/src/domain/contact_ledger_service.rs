//! Contact ledger service implementing the identify driving port.
//!
//! One identify attempt reads the matches, expands them to their groups,
//! decides, performs at most one guarded write and consolidates. A write
//! rejected as conflicting restarts the attempt from the matcher.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::consolidation::{
    ConsolidatedContact, LedgerInvariantError, LinkDecision, consolidate, decide,
    governing_primary_ids,
};
use crate::domain::ports::{ContactRepository, ContactRepositoryError, IdentifyCommand};
use crate::domain::{Contact, ContactId, Error, IdentifyRequest, NewContact};

/// Attempts made before contention is reported to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Identity reconciliation over a [`ContactRepository`].
#[derive(Clone)]
pub struct ContactLedgerService<R> {
    repo: Arc<R>,
    max_attempts: u32,
}

impl<R> ContactLedgerService<R> {
    /// Create a service with the default retry budget.
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the number of attempts per request. Values below one are
    /// raised to one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Why a single attempt stopped.
enum AttemptFailure {
    /// A guarded write lost a race; the attempt may be repeated.
    Contended(String),
    Fatal(Error),
}

impl From<ContactRepositoryError> for AttemptFailure {
    fn from(error: ContactRepositoryError) -> Self {
        match error {
            ContactRepositoryError::Conflict { message } => Self::Contended(message),
            ContactRepositoryError::Connection { message } => Self::Fatal(
                Error::service_unavailable(format!("contact repository unavailable: {message}")),
            ),
            ContactRepositoryError::Query { message } => {
                Self::Fatal(Error::internal(format!("contact repository error: {message}")))
            }
        }
    }
}

impl From<LedgerInvariantError> for AttemptFailure {
    fn from(violation: LedgerInvariantError) -> Self {
        error!(%violation, "contact ledger invariant violated");
        Self::Fatal(Error::internal(format!("contact ledger invariant violated: {violation}")))
    }
}

impl<R> ContactLedgerService<R>
where
    R: ContactRepository,
{
    async fn attempt(&self, request: &IdentifyRequest) -> Result<ConsolidatedContact, AttemptFailure> {
        let query = request.match_query();
        let matches = self.repo.find_matching(&query).await?;
        debug!(matches = matches.len(), "matched existing contacts");

        if matches.is_empty() {
            let created = self.repo.insert(&NewContact::primary(&query)).await?;
            info!(contact_id = %created.id, "created primary contact");
            return Ok(consolidate(std::slice::from_ref(&created))?);
        }

        let primary_ids = governing_primary_ids(&matches);
        let mut closure = self.repo.find_groups(&primary_ids).await?;
        debug!(
            groups = primary_ids.len(),
            records = closure.len(),
            "expanded matches to their groups"
        );

        let decision = decide(&closure, &query)?;
        debug!(?decision, "link decision");

        let group = match decision {
            LinkDecision::Unchanged { .. } => closure,
            LinkDecision::AppendSecondary { primary_id } => {
                let expected = contact_ids(&matches);
                let created = self
                    .repo
                    .insert(&NewContact::secondary(&query, primary_id, expected))
                    .await?;
                info!(
                    contact_id = %created.id,
                    primary_id = %primary_id,
                    "created secondary contact"
                );
                closure.push(created);
                closure
            }
            LinkDecision::MergePrimaries(plan) => {
                self.repo.merge(&plan).await?;
                info!(
                    survivor = %plan.survivor(),
                    demoted = ?plan.demoted(),
                    "merged primary contacts"
                );
                self.repo.find_groups(&[plan.survivor()]).await?
            }
        };

        Ok(consolidate(&group)?)
    }
}

#[async_trait]
impl<R> IdentifyCommand for ContactLedgerService<R>
where
    R: ContactRepository,
{
    async fn identify(&self, request: &IdentifyRequest) -> Result<ConsolidatedContact, Error> {
        for attempt in 1..=self.max_attempts {
            match self.attempt(request).await {
                Ok(contact) => return Ok(contact),
                Err(AttemptFailure::Fatal(err)) => return Err(err),
                Err(AttemptFailure::Contended(message)) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        %message,
                        "identify lost a write race"
                    );
                }
            }
        }
        Err(
            Error::service_unavailable("contact ledger is busy, retry the request")
                .with_details(json!({ "attempts": self.max_attempts })),
        )
    }
}

/// Ids of `contacts`, in order.
pub fn contact_ids(contacts: &[Contact]) -> Vec<ContactId> {
    contacts.iter().map(|contact| contact.id).collect()
}

#[cfg(test)]
#[path = "contact_ledger_service_tests.rs"]
mod tests;
