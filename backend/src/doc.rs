//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the identify endpoint, the health endpoints and the
//! request, response and error schemas they use. The document is served by
//! Swagger UI in debug builds and exported via `cargo run --bin openapi-dump`.

use utoipa::OpenApi;

use crate::domain::{Error, ErrorCode};
use crate::inbound::http::health::HealthStatus;
use crate::inbound::http::identify::{ContactSummary, IdentifyRequestBody, IdentifyResponse};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Contact Ledger API",
        description = "Identity reconciliation over observed email addresses and phone numbers."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::identify::identify,
        crate::inbound::http::health::health,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        IdentifyRequestBody,
        IdentifyResponse,
        ContactSummary,
        HealthStatus,
        Error,
        ErrorCode
    )),
    tags(
        (name = "identify", description = "Identity reconciliation"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
