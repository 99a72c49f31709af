//! Port for contact record storage.
//!
//! The ledger never mutates records in place except through the two guarded
//! writes below. Both carry the precondition the caller's decision relied on,
//! and adapters reject the write with
//! [`ContactRepositoryError::Conflict`] when it no longer holds. Callers treat
//! a conflict as "re-read and decide again".

use async_trait::async_trait;

use crate::domain::{Contact, ContactId, ContactMatchQuery, MergePlan, NewContact};

use super::define_port_error;

define_port_error! {
    /// Errors raised by contact repository adapters.
    pub enum ContactRepositoryError {
        /// The store could not be reached.
        Connection { message: String } =>
            "contact repository connection failed: {message}",
        /// A query failed or returned data that violates the schema.
        Query { message: String } =>
            "contact repository query failed: {message}",
        /// A guarded write found the ledger changed since it was read.
        Conflict { message: String } =>
            "contact repository write conflict: {message}",
    }
}

/// Storage contract for contact records.
///
/// Every read excludes soft-deleted rows and returns records oldest first
/// (creation time, then id).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Records whose email or phone number equals the query's.
    ///
    /// An empty query matches nothing.
    async fn find_matching(
        &self,
        query: &ContactMatchQuery,
    ) -> Result<Vec<Contact>, ContactRepositoryError>;

    /// The given primaries together with every secondary linked to them.
    async fn find_groups(
        &self,
        primary_ids: &[ContactId],
    ) -> Result<Vec<Contact>, ContactRepositoryError>;

    /// Store a new record.
    ///
    /// Rejected with a conflict when the live match set for the record's
    /// identifiers differs from `expected_matches`, or when a secondary's
    /// primary is no longer a live primary.
    async fn insert(&self, contact: &NewContact) -> Result<Contact, ContactRepositoryError>;

    /// Demote the plan's younger primaries under the survivor and re-point
    /// their secondaries, atomically.
    ///
    /// Rejected with a conflict when any involved record is no longer a live
    /// primary.
    async fn merge(&self, plan: &MergePlan) -> Result<(), ContactRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ContactRepositoryError::connection("pool timed out"), "connection failed: pool timed out")]
    #[case(ContactRepositoryError::query("bad row"), "query failed: bad row")]
    #[case(ContactRepositoryError::conflict("match set changed"), "write conflict: match set changed")]
    fn errors_render_their_context(#[case] error: ContactRepositoryError, #[case] fragment: &str) {
        assert!(
            error.to_string().contains(fragment),
            "{error} should contain {fragment}"
        );
    }
}
