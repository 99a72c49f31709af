//! Identify API handler.
//!
//! ```text
//! POST /identify {"email":"mcfly@hillvalley.edu","phoneNumber":"123456"}
//! ```

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::domain::{
    ConsolidatedContact, ContactValidationError, EmailAddress, Error, IdentifyRequest,
    PhoneNumber,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Top-level message for every rejected identify body.
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body";
const MISSING_IDENTIFIER_MESSAGE: &str = "At least one of email or phoneNumber must be provided";

/// Request body for `POST /identify`.
///
/// Fields are kept as raw JSON so each one can be reported individually.
/// `null` and `""` count as absent; `phoneNumber` may be a JSON number.
/// Other keys are ignored.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequestBody {
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "mcfly@hillvalley.edu")]
    pub email: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "123456")]
    pub phone_number: Option<Value>,
}

/// Consolidated identity as rendered on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    #[schema(example = 1)]
    pub primary_contact_id: i32,
    #[schema(example = json!(["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"]))]
    pub emails: Vec<String>,
    #[schema(example = json!(["123456"]))]
    pub phone_numbers: Vec<String>,
    #[schema(example = json!([23]))]
    pub secondary_contact_ids: Vec<i32>,
}

/// Response body for `POST /identify`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct IdentifyResponse {
    pub contact: ContactSummary,
}

impl From<ConsolidatedContact> for IdentifyResponse {
    fn from(value: ConsolidatedContact) -> Self {
        Self {
            contact: ContactSummary {
                primary_contact_id: value.primary_contact_id.get(),
                emails: value.emails.into_iter().map(String::from).collect(),
                phone_numbers: value.phone_numbers.into_iter().map(String::from).collect(),
                secondary_contact_ids: value
                    .secondary_contact_ids
                    .into_iter()
                    .map(i32::from)
                    .collect(),
            },
        }
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Issue {
    field: &'static str,
    code: &'static str,
    message: String,
}

impl Issue {
    fn new(field: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }

    fn from_validation(field: &'static str, err: &ContactValidationError) -> Self {
        let code = match err {
            ContactValidationError::EmailTooLong { .. }
            | ContactValidationError::PhoneNumberTooLong { .. } => "too_long",
            ContactValidationError::EmailWhitespace
            | ContactValidationError::PhoneNumberWhitespace => "surrounding_whitespace",
            ContactValidationError::InvalidEmail => "invalid_email",
            _ => "invalid_value",
        };
        Self::new(field, code, err.to_string())
    }
}

/// Reduce a raw field to the text it carries, or `None` when absent.
fn present_text(value: Option<Value>, allow_number: bool) -> Result<Option<String>, &'static str> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) if allow_number => Ok(Some(number.to_string())),
        Some(_) => Err("invalid_type"),
    }
}

fn parse_email(raw: Option<Value>, issues: &mut Vec<Issue>) -> Option<EmailAddress> {
    match present_text(raw, false) {
        Ok(text) => text.and_then(|text| {
            EmailAddress::new(text)
                .map_err(|err| issues.push(Issue::from_validation("email", &err)))
                .ok()
        }),
        Err(code) => {
            issues.push(Issue::new("email", code, "email must be a string"));
            None
        }
    }
}

fn parse_phone_number(raw: Option<Value>, issues: &mut Vec<Issue>) -> Option<PhoneNumber> {
    match present_text(raw, true) {
        Ok(text) => text.and_then(|text| {
            PhoneNumber::new(text)
                .map_err(|err| issues.push(Issue::from_validation("phoneNumber", &err)))
                .ok()
        }),
        Err(code) => {
            issues.push(Issue::new(
                "phoneNumber",
                code,
                "phoneNumber must be a string or a number",
            ));
            None
        }
    }
}

impl TryFrom<IdentifyRequestBody> for IdentifyRequest {
    type Error = Error;

    fn try_from(body: IdentifyRequestBody) -> Result<Self, Self::Error> {
        let mut issues = Vec::new();
        let email = parse_email(body.email, &mut issues);
        let phone_number = parse_phone_number(body.phone_number, &mut issues);
        if !issues.is_empty() {
            return Err(invalid_body(issues));
        }

        IdentifyRequest::new(email, phone_number).map_err(|_| {
            invalid_body(vec![Issue::new(
                "body",
                "missing_identifier",
                MISSING_IDENTIFIER_MESSAGE,
            )])
        })
    }
}

fn invalid_body(issues: Vec<Issue>) -> Error {
    Error::invalid_request(INVALID_BODY_MESSAGE).with_details(json!({ "issues": issues }))
}

/// Reconcile an observed email and/or phone number into one identity.
///
/// Creates a primary for unseen identifiers, appends a secondary when the
/// request carries new information for a known identity, and merges
/// identities the request bridges.
#[utoipa::path(
    post,
    path = "/identify",
    request_body = IdentifyRequestBody,
    responses(
        (status = 200, description = "Consolidated identity", body = IdentifyResponse),
        (status = 400, description = "Invalid request body", body = Error),
        (status = 500, description = "Internal server error", body = Error),
        (status = 503, description = "Store unavailable or contended", body = Error)
    ),
    tags = ["identify"],
    operation_id = "identify"
)]
#[post("/identify")]
pub async fn identify(
    state: web::Data<HttpState>,
    payload: web::Json<IdentifyRequestBody>,
) -> ApiResult<web::Json<IdentifyResponse>> {
    let request = IdentifyRequest::try_from(payload.into_inner())?;
    let contact = state.identify.identify(&request).await?;
    Ok(web::Json(IdentifyResponse::from(contact)))
}

#[cfg(test)]
mod tests;
