//! Contact repository backed by a mutex-guarded table in process memory.
//!
//! Holding the single lock for the whole of each write gives the same
//! guarantees the PostgreSQL adapter gets from transactions and row locks:
//! guarded inserts and merges see a stable table and apply all-or-nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use tracing::debug;

use crate::domain::ports::{ContactRepository, ContactRepositoryError};
use crate::domain::{
    Contact, ContactId, ContactLink, ContactMatchQuery, MergePlan, NewContact, sort_by_age,
};

#[derive(Debug, Default)]
struct ContactTable {
    next_id: i32,
    rows: Vec<Contact>,
}

impl ContactTable {
    fn live(&self) -> impl Iterator<Item = &Contact> {
        self.rows.iter().filter(|contact| contact.is_live())
    }

    fn is_live_primary(&self, id: ContactId) -> bool {
        self.live()
            .any(|contact| contact.id == id && contact.is_primary())
    }

    fn allocate_id(&mut self) -> Result<ContactId, ContactRepositoryError> {
        let id = self.next_id.max(1);
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| ContactRepositoryError::query("contact id space exhausted"))?;
        Ok(ContactId::new(id))
    }
}

fn oldest_first(contacts: impl Iterator<Item = Contact>) -> Vec<Contact> {
    let mut contacts: Vec<Contact> = contacts.collect();
    sort_by_age(&mut contacts);
    contacts
}

/// In-memory implementation of [`ContactRepository`].
///
/// # Examples
/// ```
/// use contact_ledger::outbound::memory::InMemoryContactRepository;
///
/// let repo = InMemoryContactRepository::default();
/// assert!(repo.snapshot().expect("table readable").is_empty());
/// ```
pub struct InMemoryContactRepository {
    table: Mutex<ContactTable>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryContactRepository {
    fn default() -> Self {
        Self::new(Arc::new(DefaultClock))
    }
}

impl InMemoryContactRepository {
    /// Create an empty store stamping records with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_records(clock, Vec::new())
    }

    /// Create a store pre-loaded with `records`. New ids continue after the
    /// highest seeded id.
    pub fn with_records(clock: Arc<dyn Clock>, records: Vec<Contact>) -> Self {
        let next_id = records
            .iter()
            .map(|contact| contact.id.get())
            .max()
            .map_or(1, |id| id.saturating_add(1));
        Self {
            table: Mutex::new(ContactTable {
                next_id,
                rows: records,
            }),
            clock,
        }
    }

    /// Every stored record, deleted ones included, ordered by id.
    pub fn snapshot(&self) -> Result<Vec<Contact>, ContactRepositoryError> {
        let table = self.lock()?;
        let mut rows = table.rows.clone();
        rows.sort_by_key(|contact| contact.id);
        Ok(rows)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ContactTable>, ContactRepositoryError> {
        self.table
            .lock()
            .map_err(|_| ContactRepositoryError::connection("contact table lock poisoned"))
    }
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn find_matching(
        &self,
        query: &ContactMatchQuery,
    ) -> Result<Vec<Contact>, ContactRepositoryError> {
        let table = self.lock()?;
        Ok(oldest_first(
            table.live().filter(|contact| query.matches(contact)).cloned(),
        ))
    }

    async fn find_groups(
        &self,
        primary_ids: &[ContactId],
    ) -> Result<Vec<Contact>, ContactRepositoryError> {
        let table = self.lock()?;
        Ok(oldest_first(
            table
                .live()
                .filter(|contact| {
                    primary_ids.contains(&contact.id)
                        || contact
                            .link
                            .linked_id()
                            .is_some_and(|linked| primary_ids.contains(&linked))
                })
                .cloned(),
        ))
    }

    async fn insert(&self, contact: &NewContact) -> Result<Contact, ContactRepositoryError> {
        let mut table = self.lock()?;

        let query = contact.match_query();
        let mut current: Vec<ContactId> = table
            .live()
            .filter(|stored| query.matches(stored))
            .map(|stored| stored.id)
            .collect();
        current.sort_unstable();
        let mut expected = contact.expected_matches.clone();
        expected.sort_unstable();
        if current != expected {
            return Err(ContactRepositoryError::conflict(format!(
                "match set changed from {expected:?} to {current:?}"
            )));
        }

        if let ContactLink::Secondary { primary_id } = contact.link {
            if !table.is_live_primary(primary_id) {
                return Err(ContactRepositoryError::conflict(format!(
                    "contact {primary_id} is no longer a live primary"
                )));
            }
        }

        let duplicate = table
            .live()
            .any(|stored| stored.has_pair(contact.email.as_ref(), contact.phone_number.as_ref()));
        if duplicate {
            return Err(ContactRepositoryError::conflict(
                "identifier pair already recorded",
            ));
        }

        let now = self.clock.utc();
        let stored = Contact {
            id: table.allocate_id()?,
            email: contact.email.clone(),
            phone_number: contact.phone_number.clone(),
            link: contact.link,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        table.rows.push(stored.clone());
        debug!(contact_id = %stored.id, "inserted contact into memory table");
        Ok(stored)
    }

    async fn merge(&self, plan: &MergePlan) -> Result<(), ContactRepositoryError> {
        let mut table = self.lock()?;

        if let Some(stale) = plan
            .all_primaries()
            .into_iter()
            .find(|id| !table.is_live_primary(*id))
        {
            return Err(ContactRepositoryError::conflict(format!(
                "contact {stale} is no longer a live primary"
            )));
        }

        let survivor = plan.survivor();
        let demoted = plan.demoted();
        let now = self.clock.utc();
        for contact in &mut table.rows {
            let repoint = demoted.contains(&contact.id)
                || contact
                    .link
                    .linked_id()
                    .is_some_and(|linked| demoted.contains(&linked));
            if repoint {
                contact.link = ContactLink::Secondary {
                    primary_id: survivor,
                };
                contact.updated_at = now;
            }
        }
        debug!(%survivor, ?demoted, "merged contact groups in memory table");
        Ok(())
    }
}
