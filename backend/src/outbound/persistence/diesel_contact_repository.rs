//! PostgreSQL-backed contact repository.
//!
//! Guarded writes run in a transaction. Inserts serialise on per-identifier
//! advisory locks and re-run the match before writing; merges lock the
//! involved primary rows. Either write fails with a conflict when the state
//! it was planned against has moved on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{ContactRepository, ContactRepositoryError};
use crate::domain::{
    Contact, ContactId, ContactLink, ContactMatchQuery, EmailAddress, LinkPrecedence, MergePlan,
    NewContact, PhoneNumber,
};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{ContactRow, NewContactRow};
use super::pool::DbPool;
use super::schema::contacts;

/// Diesel-backed implementation of [`ContactRepository`].
#[derive(Clone)]
pub struct DieselContactRepository {
    pool: DbPool,
}

impl DieselContactRepository {
    /// Create a repository over the given pool.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use contact_ledger::outbound::persistence::{DbPool, DieselContactRepository, PoolConfig};
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = DbPool::new(PoolConfig::new("postgres://localhost/ledger")).await?;
    /// let repository = DieselContactRepository::new(pool);
    /// # let _ = repository;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a guarded write transaction.
enum WriteFailure {
    Diesel(diesel::result::Error),
    Conflict(String),
}

impl From<diesel::result::Error> for WriteFailure {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl From<WriteFailure> for ContactRepositoryError {
    fn from(failure: WriteFailure) -> Self {
        match failure {
            WriteFailure::Diesel(error) => map_diesel_error(error),
            WriteFailure::Conflict(message) => ContactRepositoryError::conflict(message),
        }
    }
}

/// Convert a stored row, treating empty identifier strings as absent.
fn row_to_contact(row: ContactRow) -> Result<Contact, ContactRepositoryError> {
    let invalid = |detail: String| {
        ContactRepositoryError::query(format!("contact {} is malformed: {detail}", row.id))
    };

    let email = row
        .email
        .clone()
        .filter(|value| !value.is_empty())
        .map(EmailAddress::new)
        .transpose()
        .map_err(|err| invalid(err.to_string()))?;
    let phone_number = row
        .phone_number
        .clone()
        .filter(|value| !value.is_empty())
        .map(PhoneNumber::new)
        .transpose()
        .map_err(|err| invalid(err.to_string()))?;
    let precedence: LinkPrecedence = row
        .link_precedence
        .parse()
        .map_err(|err: crate::domain::ContactValidationError| invalid(err.to_string()))?;
    let link = match (precedence, row.linked_id) {
        (LinkPrecedence::Primary, None) => ContactLink::Primary,
        (LinkPrecedence::Secondary, Some(primary_id)) => ContactLink::Secondary {
            primary_id: ContactId::new(primary_id),
        },
        (precedence, linked_id) => {
            return Err(invalid(format!(
                "{precedence} record with linked id {linked_id:?}"
            )));
        }
    };

    Ok(Contact {
        id: ContactId::new(row.id),
        email,
        phone_number,
        link,
        created_at: row.created_at,
        updated_at: row.updated_at,
        deleted_at: row.deleted_at,
    })
}

fn rows_to_contacts(rows: Vec<ContactRow>) -> Result<Vec<Contact>, ContactRepositoryError> {
    rows.into_iter().map(row_to_contact).collect()
}

/// Live rows sharing either identifier with `query`, oldest first.
async fn load_matching(
    conn: &mut AsyncPgConnection,
    query: &ContactMatchQuery,
) -> QueryResult<Vec<ContactRow>> {
    let email = query.email.as_ref().map(AsRef::as_ref);
    let phone_number = query.phone_number.as_ref().map(AsRef::as_ref);

    let mut statement = contacts::table
        .filter(contacts::deleted_at.is_null())
        .into_boxed::<Pg>();
    statement = match (email, phone_number) {
        (Some(email), Some(phone_number)) => statement.filter(
            contacts::email
                .eq(email)
                .or(contacts::phone_number.eq(phone_number)),
        ),
        (Some(email), None) => statement.filter(contacts::email.eq(email)),
        (None, Some(phone_number)) => statement.filter(contacts::phone_number.eq(phone_number)),
        (None, None) => return Ok(Vec::new()),
    };

    statement
        .order((contacts::created_at.asc(), contacts::id.asc()))
        .select(ContactRow::as_select())
        .load(conn)
        .await
}

/// Advisory lock keys for a query's identifiers, sorted so concurrent
/// writers always acquire them in the same order.
fn identifier_lock_keys(query: &ContactMatchQuery) -> Vec<String> {
    let mut keys: Vec<String> = query
        .email
        .iter()
        .map(|email| format!("email:{email}"))
        .chain(query.phone_number.iter().map(|phone| format!("phone:{phone}")))
        .collect();
    keys.sort();
    keys
}

async fn lock_identifiers(conn: &mut AsyncPgConnection, keys: &[String]) -> QueryResult<()> {
    for key in keys {
        diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind::<Text, _>(key.as_str())
            .execute(conn)
            .await?;
    }
    Ok(())
}

fn sorted_ids(ids: impl IntoIterator<Item = i32>) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids
}

/// Whether the `(precedence, deleted_at)` pair describes a live primary.
fn is_live_primary(precedence: &str, deleted_at: Option<DateTime<Utc>>) -> bool {
    precedence == LinkPrecedence::Primary.as_str() && deleted_at.is_none()
}

#[async_trait]
impl ContactRepository for DieselContactRepository {
    async fn find_matching(
        &self,
        query: &ContactMatchQuery,
    ) -> Result<Vec<Contact>, ContactRepositoryError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = load_matching(&mut conn, query)
            .await
            .map_err(map_diesel_error)?;
        rows_to_contacts(rows)
    }

    async fn find_groups(
        &self,
        primary_ids: &[ContactId],
    ) -> Result<Vec<Contact>, ContactRepositoryError> {
        if primary_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = primary_ids.iter().map(|id| id.get()).collect();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows = contacts::table
            .filter(contacts::deleted_at.is_null())
            .filter(
                contacts::id
                    .eq_any(&ids)
                    .or(contacts::linked_id.eq_any(&ids)),
            )
            .order((contacts::created_at.asc(), contacts::id.asc()))
            .select(ContactRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_contacts(rows)
    }

    async fn insert(&self, contact: &NewContact) -> Result<Contact, ContactRepositoryError> {
        let match_query = contact.match_query();
        let lock_keys = identifier_lock_keys(&match_query);
        let expected = sorted_ids(contact.expected_matches.iter().map(|id| id.get()));
        let linked_id = contact.link.linked_id().map(ContactId::get);
        let new_row = NewContactRow {
            phone_number: contact.phone_number.as_ref().map(AsRef::as_ref),
            email: contact.email.as_ref().map(AsRef::as_ref),
            linked_id,
            link_precedence: contact.link.precedence().as_str(),
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = conn
            .transaction(|conn| {
                async move {
                    lock_identifiers(conn, &lock_keys).await?;

                    let current = load_matching(conn, &match_query).await?;
                    let current = sorted_ids(current.iter().map(|row| row.id));
                    if current != expected {
                        return Err(WriteFailure::Conflict(format!(
                            "match set changed from {expected:?} to {current:?}"
                        )));
                    }

                    if let Some(primary_id) = linked_id {
                        let governing: Option<(String, Option<DateTime<Utc>>)> = contacts::table
                            .find(primary_id)
                            .select((contacts::link_precedence, contacts::deleted_at))
                            .for_update()
                            .first(conn)
                            .await
                            .optional()?;
                        let still_primary = governing
                            .as_ref()
                            .is_some_and(|(precedence, deleted_at)| {
                                is_live_primary(precedence, *deleted_at)
                            });
                        if !still_primary {
                            return Err(WriteFailure::Conflict(format!(
                                "contact {primary_id} is no longer a live primary"
                            )));
                        }
                    }

                    let row = diesel::insert_into(contacts::table)
                        .values(&new_row)
                        .returning(ContactRow::as_returning())
                        .get_result(conn)
                        .await?;
                    Ok::<_, WriteFailure>(row)
                }
                .scope_boxed()
            })
            .await
            .map_err(ContactRepositoryError::from)?;

        debug!(contact_id = row.id, "inserted contact row");
        row_to_contact(row)
    }

    async fn merge(&self, plan: &MergePlan) -> Result<(), ContactRepositoryError> {
        let survivor = plan.survivor().get();
        let demoted: Vec<i32> = plan.demoted().iter().map(|id| id.get()).collect();
        let involved = sorted_ids(plan.all_primaries().into_iter().map(ContactId::get));

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let (demoted_rows, repointed_rows) = conn
            .transaction(|conn| {
                async move {
                    let locked: Vec<(i32, String, Option<DateTime<Utc>>)> = contacts::table
                        .filter(contacts::id.eq_any(&involved))
                        .order(contacts::id.asc())
                        .select((
                            contacts::id,
                            contacts::link_precedence,
                            contacts::deleted_at,
                        ))
                        .for_update()
                        .load(conn)
                        .await?;

                    let live: Vec<i32> = locked
                        .iter()
                        .filter(|(_, precedence, deleted_at)| {
                            is_live_primary(precedence, *deleted_at)
                        })
                        .map(|(id, _, _)| *id)
                        .collect();
                    if live != involved {
                        return Err(WriteFailure::Conflict(format!(
                            "expected live primaries {involved:?}, found {live:?}"
                        )));
                    }

                    let demoted_rows = diesel::update(
                        contacts::table.filter(contacts::id.eq_any(&demoted)),
                    )
                    .set((
                        contacts::link_precedence.eq(LinkPrecedence::Secondary.as_str()),
                        contacts::linked_id.eq(survivor),
                        contacts::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await?;

                    let repointed_rows = diesel::update(
                        contacts::table.filter(contacts::linked_id.eq_any(&demoted)),
                    )
                    .set((
                        contacts::linked_id.eq(survivor),
                        contacts::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await?;

                    Ok::<_, WriteFailure>((demoted_rows, repointed_rows))
                }
                .scope_boxed()
            })
            .await
            .map_err(ContactRepositoryError::from)?;

        debug!(
            survivor,
            demoted_rows, repointed_rows, "merged contact groups"
        );
        Ok(())
    }
}
