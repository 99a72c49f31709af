//! Contact records and the identifier value objects they carry.
//!
//! A [`Contact`] is one observation of an `(email, phone number)` pair. Groups
//! of contacts sharing an identity are parent-pointer trees of depth one: a
//! single primary plus secondaries pointing at it.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum accepted length of an email address, in characters.
pub const EMAIL_MAX: usize = 254;
/// Maximum accepted length of a phone number, in characters.
pub const PHONE_NUMBER_MAX: usize = 32;

/// Validation errors raised while constructing contact value objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactValidationError {
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email must not have leading or trailing whitespace")]
    EmailWhitespace,
    #[error("email must be at most {max} characters")]
    EmailTooLong { max: usize },
    #[error("email must be a valid address")]
    InvalidEmail,
    #[error("phone number must not be empty")]
    EmptyPhoneNumber,
    #[error("phone number must not have leading or trailing whitespace")]
    PhoneNumberWhitespace,
    #[error("phone number must be at most {max} characters")]
    PhoneNumberTooLong { max: usize },
    #[error("unknown link precedence: {0}")]
    UnknownPrecedence(String),
}

/// Store-assigned contact identifier.
///
/// Identifiers increase with creation order and are never reused, so they
/// double as the tie-break when two records share a creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(i32);

impl ContactId {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for ContactId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<ContactId> for i32 {
    fn from(value: ContactId) -> Self {
        value.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // Deliberately loose: one `@`, no whitespace, a dot in the domain.
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Syntactically valid email address.
///
/// Comparison is exact string equality; no case folding is applied.
///
/// # Examples
/// ```
/// use contact_ledger::domain::EmailAddress;
///
/// let email = EmailAddress::new("doc@hillvalley.edu").expect("valid email");
/// assert_eq!(email.as_ref(), "doc@hillvalley.edu");
/// assert!(EmailAddress::new("not-an-email").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Result<Self, ContactValidationError> {
        Self::from_owned(email.into())
    }

    fn from_owned(email: String) -> Result<Self, ContactValidationError> {
        if email.is_empty() {
            return Err(ContactValidationError::EmptyEmail);
        }
        if email.trim() != email {
            return Err(ContactValidationError::EmailWhitespace);
        }
        if email.chars().count() > EMAIL_MAX {
            return Err(ContactValidationError::EmailTooLong { max: EMAIL_MAX });
        }
        if !email_regex().is_match(&email) {
            return Err(ContactValidationError::InvalidEmail);
        }
        Ok(Self(email))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ContactValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Phone number as submitted.
///
/// No normalisation is performed: `"123456"` and `"123-456"` are different
/// numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(phone_number: impl Into<String>) -> Result<Self, ContactValidationError> {
        Self::from_owned(phone_number.into())
    }

    fn from_owned(phone_number: String) -> Result<Self, ContactValidationError> {
        if phone_number.is_empty() {
            return Err(ContactValidationError::EmptyPhoneNumber);
        }
        if phone_number.trim() != phone_number {
            return Err(ContactValidationError::PhoneNumberWhitespace);
        }
        if phone_number.chars().count() > PHONE_NUMBER_MAX {
            return Err(ContactValidationError::PhoneNumberTooLong {
                max: PHONE_NUMBER_MAX,
            });
        }
        Ok(Self(phone_number))
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ContactValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Flat precedence flag as stored in the `link_precedence` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = ContactValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            other => Err(ContactValidationError::UnknownPrecedence(other.to_owned())),
        }
    }
}

/// Position of a record within its group.
///
/// A secondary always names its primary, and a primary never names anything,
/// so the "linked id present iff secondary" rule cannot be broken in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactLink {
    Primary,
    Secondary { primary_id: ContactId },
}

impl ContactLink {
    pub const fn precedence(self) -> LinkPrecedence {
        match self {
            Self::Primary => LinkPrecedence::Primary,
            Self::Secondary { .. } => LinkPrecedence::Secondary,
        }
    }

    pub const fn linked_id(self) -> Option<ContactId> {
        match self {
            Self::Primary => None,
            Self::Secondary { primary_id } => Some(primary_id),
        }
    }
}

/// A stored contact record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: ContactId,
    pub email: Option<EmailAddress>,
    pub phone_number: Option<PhoneNumber>,
    pub link: ContactLink,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        matches!(self.link, ContactLink::Primary)
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The primary governing this record's group: itself, or the record its
    /// link points at.
    pub fn governing_primary_id(&self) -> ContactId {
        match self.link {
            ContactLink::Primary => self.id,
            ContactLink::Secondary { primary_id } => primary_id,
        }
    }

    /// Ordering key for "oldest first": creation time, then id.
    pub fn age_key(&self) -> (DateTime<Utc>, ContactId) {
        (self.created_at, self.id)
    }

    /// Whether this record carries exactly the given pair. `None` only
    /// matches `None`.
    pub fn has_pair(&self, email: Option<&EmailAddress>, phone_number: Option<&PhoneNumber>) -> bool {
        self.email.as_ref() == email && self.phone_number.as_ref() == phone_number
    }
}

/// Identifier pair used to look up matching records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactMatchQuery {
    pub email: Option<EmailAddress>,
    pub phone_number: Option<PhoneNumber>,
}

impl ContactMatchQuery {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone_number.is_none()
    }

    /// Whether `contact` shares either identifier with this query.
    pub fn matches(&self, contact: &Contact) -> bool {
        let email_hit = matches!(
            (&self.email, &contact.email),
            (Some(wanted), Some(stored)) if wanted == stored
        );
        let phone_hit = matches!(
            (&self.phone_number, &contact.phone_number),
            (Some(wanted), Some(stored)) if wanted == stored
        );
        email_hit || phone_hit
    }
}

/// A record to be inserted, together with the write precondition.
///
/// `expected_matches` holds the ids the matcher returned when the decision
/// was taken. Stores reject the insert with a conflict when a fresh match
/// under lock yields a different set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub email: Option<EmailAddress>,
    pub phone_number: Option<PhoneNumber>,
    pub link: ContactLink,
    pub expected_matches: Vec<ContactId>,
}

impl NewContact {
    /// A fresh primary for identifiers nobody has seen yet.
    pub fn primary(query: &ContactMatchQuery) -> Self {
        Self {
            email: query.email.clone(),
            phone_number: query.phone_number.clone(),
            link: ContactLink::Primary,
            expected_matches: Vec::new(),
        }
    }

    /// A secondary carrying new information for an existing group.
    pub fn secondary(
        query: &ContactMatchQuery,
        primary_id: ContactId,
        expected_matches: Vec<ContactId>,
    ) -> Self {
        Self {
            email: query.email.clone(),
            phone_number: query.phone_number.clone(),
            link: ContactLink::Secondary { primary_id },
            expected_matches,
        }
    }

    /// The query a store re-runs to validate `expected_matches`.
    pub fn match_query(&self) -> ContactMatchQuery {
        ContactMatchQuery {
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
        }
    }
}

/// Sort contacts oldest first.
pub fn sort_by_age(contacts: &mut [Contact]) {
    contacts.sort_by_key(Contact::age_key);
}
