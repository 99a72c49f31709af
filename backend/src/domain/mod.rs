//! Domain model and services for the contact ledger.
//!
//! Purpose: hold the contact entity, the identifier value objects, the pure
//! consolidation algorithm and the service driving it. Nothing here knows
//! about HTTP or SQL; adapters reach the domain through [`ports`].
//!
//! Public surface:
//! - `Contact`, `ContactId`, `EmailAddress`, `PhoneNumber`, `ContactLink`:
//!   the stored record and its parts.
//! - `IdentifyRequest`: a validated observation.
//! - `ConsolidatedContact`: the externally visible identity summary.
//! - `ContactLedgerService`: implementation of the identify driving port.
//! - `Error` / `ErrorCode`: transport agnostic failures.

pub mod consolidation;
pub mod contact;
pub mod contact_ledger_service;
pub mod error;
pub mod identify;
pub mod ports;
pub mod trace_id;

pub use self::consolidation::{
    ConsolidatedContact, LedgerInvariantError, LinkDecision, MergePlan, consolidate, decide,
    governing_primary_ids,
};
pub use self::contact::{
    Contact, ContactId, ContactLink, ContactMatchQuery, ContactValidationError, EmailAddress,
    LinkPrecedence, NewContact, PhoneNumber, sort_by_age,
};
pub use self::contact_ledger_service::{ContactLedgerService, DEFAULT_MAX_ATTEMPTS, contact_ids};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::identify::{IdentifyRequest, MissingIdentifier};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use contact_ledger::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::service_unavailable("store offline"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
