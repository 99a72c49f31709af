//! Pure consolidation logic over one request's closure of contacts.
//!
//! Nothing here touches storage. The ledger service feeds these functions
//! whatever the repository returned and acts on the outcome.

use std::collections::HashSet;

use super::contact::{Contact, ContactId, ContactMatchQuery, EmailAddress, PhoneNumber};

/// Broken ledger invariants detected while deciding or consolidating.
///
/// These indicate corrupt stored data or a bug, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerInvariantError {
    #[error("closure is empty")]
    EmptyClosure,
    #[error("group has no primary contact")]
    NoPrimary,
    #[error("group has {count} primary contacts after consolidation")]
    MultiplePrimaries { count: usize },
    #[error("merge needs at least two primaries, got {count}")]
    NotEnoughPrimaries { count: usize },
    #[error("contact {id} is not a primary")]
    NotPrimary { id: ContactId },
}

/// Demotion plan for primaries discovered to share an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    survivor: ContactId,
    demoted: Vec<ContactId>,
}

impl MergePlan {
    /// Build a plan where the oldest primary survives and the rest are
    /// demoted, oldest first.
    pub fn from_primaries(primaries: &[&Contact]) -> Result<Self, LedgerInvariantError> {
        if primaries.len() < 2 {
            return Err(LedgerInvariantError::NotEnoughPrimaries {
                count: primaries.len(),
            });
        }
        if let Some(stray) = primaries.iter().find(|contact| !contact.is_primary()) {
            return Err(LedgerInvariantError::NotPrimary { id: stray.id });
        }
        let mut ordered: Vec<&Contact> = primaries.to_vec();
        ordered.sort_by_key(|contact| contact.age_key());
        ordered.dedup_by_key(|contact| contact.id);
        let mut ids = ordered.into_iter().map(|contact| contact.id);
        let survivor = ids
            .next()
            .ok_or(LedgerInvariantError::NotEnoughPrimaries { count: 0 })?;
        let demoted: Vec<ContactId> = ids.collect();
        if demoted.is_empty() {
            return Err(LedgerInvariantError::NotEnoughPrimaries { count: 1 });
        }
        Ok(Self { survivor, demoted })
    }

    pub fn survivor(&self) -> ContactId {
        self.survivor
    }

    pub fn demoted(&self) -> &[ContactId] {
        &self.demoted
    }

    /// Every primary involved, survivor first.
    pub fn all_primaries(&self) -> Vec<ContactId> {
        std::iter::once(self.survivor)
            .chain(self.demoted.iter().copied())
            .collect()
    }
}

/// What an identify request must do to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// The group already records this observation.
    Unchanged { primary_id: ContactId },
    /// The observation adds an identifier; store it as a secondary.
    AppendSecondary { primary_id: ContactId },
    /// The observation bridges separate groups; demote all but the oldest.
    MergePrimaries(MergePlan),
}

/// Governing primary ids of `matches`, in first-seen order, without
/// duplicates.
pub fn governing_primary_ids(matches: &[Contact]) -> Vec<ContactId> {
    let mut seen = HashSet::new();
    matches
        .iter()
        .map(Contact::governing_primary_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Decide how the ledger must change for `query` given its closure.
///
/// A merge wins over appending: a bridging request never creates a record.
pub fn decide(
    closure: &[Contact],
    query: &ContactMatchQuery,
) -> Result<LinkDecision, LedgerInvariantError> {
    if closure.is_empty() {
        return Err(LedgerInvariantError::EmptyClosure);
    }

    let primaries: Vec<&Contact> = closure.iter().filter(|c| c.is_primary()).collect();
    let primary_id = match primaries.as_slice() {
        [] => return Err(LedgerInvariantError::NoPrimary),
        [only] => only.id,
        _ => return MergePlan::from_primaries(&primaries).map(LinkDecision::MergePrimaries),
    };

    let email = query.email.as_ref();
    let phone_number = query.phone_number.as_ref();
    if closure.iter().any(|c| c.has_pair(email, phone_number)) {
        return Ok(LinkDecision::Unchanged { primary_id });
    }

    let has_new_email =
        email.is_some_and(|wanted| !closure.iter().any(|c| c.email.as_ref() == Some(wanted)));
    let has_new_phone = phone_number
        .is_some_and(|wanted| !closure.iter().any(|c| c.phone_number.as_ref() == Some(wanted)));

    if has_new_email || has_new_phone {
        Ok(LinkDecision::AppendSecondary { primary_id })
    } else {
        Ok(LinkDecision::Unchanged { primary_id })
    }
}

/// Externally visible summary of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedContact {
    pub primary_contact_id: ContactId,
    pub emails: Vec<EmailAddress>,
    pub phone_numbers: Vec<PhoneNumber>,
    pub secondary_contact_ids: Vec<ContactId>,
}

/// Project a closed group into its summary.
///
/// The primary's identifiers come first, then each secondary's in age order,
/// each value once.
pub fn consolidate(group: &[Contact]) -> Result<ConsolidatedContact, LedgerInvariantError> {
    let mut ordered: Vec<&Contact> = group.iter().collect();
    ordered.sort_by_key(|contact| contact.age_key());

    let (primaries, secondaries): (Vec<&Contact>, Vec<&Contact>) =
        ordered.into_iter().partition(|c| c.is_primary());
    let primary = match primaries.as_slice() {
        [] => return Err(LedgerInvariantError::NoPrimary),
        [only] => *only,
        many => return Err(LedgerInvariantError::MultiplePrimaries { count: many.len() }),
    };

    let in_order = || std::iter::once(primary).chain(secondaries.iter().copied());
    Ok(ConsolidatedContact {
        primary_contact_id: primary.id,
        emails: first_occurrences(in_order().filter_map(|c| c.email.as_ref())),
        phone_numbers: first_occurrences(in_order().filter_map(|c| c.phone_number.as_ref())),
        secondary_contact_ids: secondaries.iter().map(|c| c.id).collect(),
    })
}

fn first_occurrences<'a, T>(values: impl Iterator<Item = &'a T>) -> Vec<T>
where
    T: Clone + Eq + std::hash::Hash + 'a,
{
    let mut seen = HashSet::new();
    values
        .filter(|value| seen.insert(*value))
        .cloned()
        .collect()
}
