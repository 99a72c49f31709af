//! Tests for the identify handler.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test, web};
use rstest::rstest;
use serde_json::Value;

use super::*;
use crate::domain::ports::{FixtureIdentifyCommand, IdentifyCommand, MockIdentifyCommand};
use crate::domain::{ContactId, ContactLedgerService};
use crate::inbound::http::error::json_error_handler;
use crate::outbound::memory::InMemoryContactRepository;

async fn post_identify(command: Arc<dyn IdentifyCommand>, body: Value) -> (StatusCode, Value) {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(HttpState::new(command)))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(identify),
    )
    .await;
    let request = actix_test::TestRequest::post()
        .uri("/identify")
        .set_json(&body)
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    let status = response.status();
    let payload: Value = actix_test::read_body_json(response).await;
    (status, payload)
}

fn issue_codes(payload: &Value) -> Vec<(String, String)> {
    payload["details"]["issues"]
        .as_array()
        .map(|issues| {
            issues
                .iter()
                .map(|issue| {
                    (
                        issue["field"].as_str().unwrap_or_default().to_owned(),
                        issue["code"].as_str().unwrap_or_default().to_owned(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[rstest]
#[case(json!({ "email": "doc@hillvalley.edu", "phoneNumber": "88" }), vec!["doc@hillvalley.edu"], vec!["88"])]
#[case(json!({ "phoneNumber": 123456 }), vec![], vec!["123456"])]
#[case(json!({ "email": "doc@hillvalley.edu", "phoneNumber": null }), vec!["doc@hillvalley.edu"], vec![])]
#[case(json!({ "email": "", "phoneNumber": "88" }), vec![], vec!["88"])]
#[case(json!({ "email": "doc@hillvalley.edu", "phoneNumber": "88", "name": "Doc" }), vec!["doc@hillvalley.edu"], vec!["88"])]
#[actix_web::test]
async fn accepted_bodies_reach_the_command(
    #[case] body: Value,
    #[case] emails: Vec<&str>,
    #[case] phones: Vec<&str>,
) {
    let (status, payload) = post_identify(Arc::new(FixtureIdentifyCommand), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["contact"]["primaryContactId"], 1);
    assert_eq!(payload["contact"]["emails"], json!(emails));
    assert_eq!(payload["contact"]["phoneNumbers"], json!(phones));
    assert_eq!(payload["contact"]["secondaryContactIds"], json!([]));
}

#[rstest]
#[case(json!({}), "body", "missing_identifier")]
#[case(json!({ "email": null, "phoneNumber": "" }), "body", "missing_identifier")]
#[case(json!({ "email": "not-an-email" }), "email", "invalid_email")]
#[case(json!({ "email": 42 }), "email", "invalid_type")]
#[case(json!({ "phoneNumber": true }), "phoneNumber", "invalid_type")]
#[case(json!({ "phoneNumber": " 88" }), "phoneNumber", "surrounding_whitespace")]
#[case(json!({ "phoneNumber": "1".repeat(33) }), "phoneNumber", "too_long")]
#[actix_web::test]
async fn rejected_bodies_list_issues(
    #[case] body: Value,
    #[case] field: &str,
    #[case] code: &str,
) {
    let mut command = MockIdentifyCommand::new();
    command.expect_identify().never();

    let (status, payload) = post_identify(Arc::new(command), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "invalid_request");
    assert_eq!(payload["message"], INVALID_BODY_MESSAGE);
    assert_eq!(issue_codes(&payload), vec![(field.to_owned(), code.to_owned())]);
}

#[actix_web::test]
async fn every_bad_field_is_reported() {
    let body = json!({ "email": "nope", "phoneNumber": [] });
    let (status, payload) = post_identify(Arc::new(FixtureIdentifyCommand), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        issue_codes(&payload),
        vec![
            ("email".to_owned(), "invalid_email".to_owned()),
            ("phoneNumber".to_owned(), "invalid_type".to_owned()),
        ]
    );
}

#[actix_web::test]
async fn command_receives_validated_identifiers() {
    let mut command = MockIdentifyCommand::new();
    command
        .expect_identify()
        .withf(|request: &IdentifyRequest| {
            request.email().map(AsRef::as_ref) == Some("marty@hillvalley.edu")
                && request.phone_number().map(AsRef::as_ref) == Some("555")
        })
        .times(1)
        .returning(|_| {
            Ok(ConsolidatedContact {
                primary_contact_id: ContactId::new(4),
                emails: vec![EmailAddress::new("marty@hillvalley.edu").expect("valid email")],
                phone_numbers: vec![PhoneNumber::new("555").expect("valid phone")],
                secondary_contact_ids: vec![ContactId::new(9)],
            })
        });

    let body = json!({ "email": "marty@hillvalley.edu", "phoneNumber": 555 });
    let (status, payload) = post_identify(Arc::new(command), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload,
        json!({
            "contact": {
                "primaryContactId": 4,
                "emails": ["marty@hillvalley.edu"],
                "phoneNumbers": ["555"],
                "secondaryContactIds": [9],
            }
        })
    );
}

#[rstest]
#[case(Error::service_unavailable("contact ledger is busy"), StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")]
#[case(Error::internal("invariant violated"), StatusCode::INTERNAL_SERVER_ERROR, "internal_error")]
#[actix_web::test]
async fn command_failures_map_to_status(
    #[case] failure: Error,
    #[case] status: StatusCode,
    #[case] code: &str,
) {
    let mut command = MockIdentifyCommand::new();
    command
        .expect_identify()
        .times(1)
        .return_once(move |_| Err(failure));

    let (actual, payload) =
        post_identify(Arc::new(command), json!({ "email": "a@b.co" })).await;

    assert_eq!(actual, status);
    assert_eq!(payload["code"], code);
}

#[actix_web::test]
async fn in_memory_ledger_links_and_merges_over_http() {
    let command: Arc<dyn IdentifyCommand> = Arc::new(ContactLedgerService::new(Arc::new(
        InMemoryContactRepository::default(),
    )));

    let (_, first) = post_identify(
        command.clone(),
        json!({ "email": "lorraine@hillvalley.edu", "phoneNumber": "123456" }),
    )
    .await;
    let (_, second) = post_identify(
        command.clone(),
        json!({ "email": "mcfly@hillvalley.edu", "phoneNumber": "123456" }),
    )
    .await;
    assert_eq!(
        second["contact"]["primaryContactId"],
        first["contact"]["primaryContactId"]
    );
    assert_eq!(
        second["contact"]["emails"],
        json!(["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"])
    );
    assert_eq!(second["contact"]["phoneNumbers"], json!(["123456"]));

    let (_, george) = post_identify(
        command.clone(),
        json!({ "email": "george@hillvalley.edu", "phoneNumber": "919191" }),
    )
    .await;
    let (status, merged) = post_identify(
        command,
        json!({ "email": "lorraine@hillvalley.edu", "phoneNumber": "919191" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        merged["contact"]["primaryContactId"],
        first["contact"]["primaryContactId"]
    );
    assert_eq!(
        merged["contact"]["phoneNumbers"],
        json!(["123456", "919191"])
    );
    let secondaries = merged["contact"]["secondaryContactIds"]
        .as_array()
        .expect("secondary ids");
    assert!(secondaries.contains(&george["contact"]["primaryContactId"]));
    assert_eq!(secondaries.len(), 2);
}
