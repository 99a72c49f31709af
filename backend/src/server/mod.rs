//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::ServerConfig;

use state_builders::build_http_state;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use contact_ledger::Trace;
#[cfg(debug_assertions)]
use contact_ledger::doc::ApiDoc;
use contact_ledger::inbound::http::error::{json_error_handler, not_found};
use contact_ledger::inbound::http::health::{HealthState, health, live, ready};
use contact_ledger::inbound::http::identify::identify;
use contact_ledger::inbound::http::state::HttpState;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .wrap(Trace)
        .service(identify)
        .service(health)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app.default_service(web::route().to(not_found))
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let http_state = build_http_state(&config);

    let server = HttpServer::new(move || {
        build_app(server_health_state.clone(), http_state.clone())
    })
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::{Value, json};
    use std::net::{Ipv4Addr, SocketAddr};

    fn test_config() -> ServerConfig {
        ServerConfig::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    }

    #[actix_web::test]
    async fn app_serves_identify_and_unknown_routes() {
        let app = actix_test::init_service(build_app(
            web::Data::new(HealthState::new()),
            build_http_state(&test_config()),
        ))
        .await;

        let request = actix_test::TestRequest::post()
            .uri("/identify")
            .set_json(json!({ "phoneNumber": "123456" }))
            .to_request();
        let response = actix_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("trace-id"));

        let request = actix_test::TestRequest::get().uri("/contacts").to_request();
        let response = actix_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["code"], "not_found");
    }

    #[actix_web::test]
    async fn malformed_identify_body_uses_error_envelope() {
        let app = actix_test::init_service(build_app(
            web::Data::new(HealthState::new()),
            build_http_state(&test_config()),
        ))
        .await;

        let request = actix_test::TestRequest::post()
            .uri("/identify")
            .insert_header(("content-type", "application/json"))
            .set_payload("{")
            .to_request();
        let response = actix_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["code"], "invalid_request");
        assert!(body["traceId"].is_string());
    }

    #[actix_web::test]
    async fn create_server_marks_ready_once_bound() {
        let health_state = web::Data::new(HealthState::new());
        let server = create_server(health_state.clone(), test_config()).expect("server binds");
        assert!(health_state.is_ready());
        let handle = server.handle();
        actix_web::rt::spawn(server);
        handle.stop(false).await;
    }
}
