//! Internal Diesel row structs for the `contacts` table.
//!
//! These never leave the persistence module; the repository converts them to
//! and from domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::contacts;

/// Row struct for reading from the contacts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = contacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ContactRow {
    pub id: i32,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub linked_id: Option<i32>,
    pub link_precedence: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Insertable struct for new contact records. Timestamps use column
/// defaults.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contacts)]
pub(crate) struct NewContactRow<'a> {
    pub phone_number: Option<&'a str>,
    pub email: Option<&'a str>,
    pub linked_id: Option<i32>,
    pub link_precedence: &'a str,
}
