//! # API REST
//!
//! REST API implementation for Referra.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Bearer-token caller resolution and role/ownership checks
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON envelope, status codes, CORS)
//!
//! Uses `api-shared` for the envelope, health reporting and sessions, and `referra-core` for
//! everything else.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::RestConfig;
pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, patch};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the REST router with Swagger UI mounted at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/phi", get(handlers::list_phi).post(handlers::create_phi))
        .route("/phi/:id", get(handlers::get_phi))
        .route(
            "/referrals",
            get(handlers::list_referrals).post(handlers::submit_referral),
        )
        .route("/referrals/:id", get(handlers::get_referral))
        .route(
            "/referrals/:id/status",
            patch(handlers::update_referral_status),
        )
        .route("/dashboard", get(handlers::dashboard))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the router until the process is stopped.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ Referra REST listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_shared::{Role, StaticSessionProvider};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use referra_core::{namespace_from_env_value, CoreConfig, ReferralService};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app(dir: &TempDir) -> Router {
        let cfg = CoreConfig::new(
            dir.path().to_path_buf(),
            None,
            namespace_from_env_value(None).unwrap(),
        )
        .unwrap();
        let service = ReferralService::from_config(&cfg).unwrap();
        let sessions = StaticSessionProvider::new()
            .with_session("tok-cm1", "cm-1", Some(Role::CaseManager))
            .with_session("tok-cm2", "cm-2", Some(Role::CaseManager))
            .with_session("tok-provider", "provider-1", Some(Role::Provider))
            .with_session("tok-nobody", "nobody", None);
        router(AppState::new(service, Arc::new(sessions), cfg.namespace()))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn jane_doe() -> Value {
        json!({
            "serviceType": "Individualized Home Supports",
            "urgency": "High",
            "counties": ["Hennepin"],
            "firstName": "Jane",
            "lastName": "Doe",
            "dateOfBirth": "1990-01-01",
            "pmiNumber": "PMI-0001",
            "waiverType": "CADI"
        })
    }

    #[tokio::test]
    async fn test_health_reports_both_stores() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["ok"], true);
        assert_eq!(body["data"]["stores"]["phi"], true);
        assert_eq!(body["data"]["stores"]["workflow"], true);
        assert_eq!(body["data"]["namespace"], "referra.dev.1");
    }

    #[tokio::test]
    async fn test_missing_or_unknown_token_is_unauthorized() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(&app, request("GET", "/referrals", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, request("GET", "/referrals", Some("forged"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_submit_then_list_merges_phi() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(
            &app,
            request("POST", "/referrals", Some("tok-cm1"), Some(jane_doe())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Referral submitted successfully");
        let referral_id = body["data"]["referral"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            request("GET", "/referrals?userId=cm-1", Some("tok-cm1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let items = body["data"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], referral_id);
        assert_eq!(items[0]["status"], "pending");
        assert_eq!(items[0]["firstName"], "Jane");

        let (status, body) = send(
            &app,
            request("GET", &format!("/referrals/{}", referral_id), Some("tok-cm1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["lastName"], "Doe");
    }

    #[tokio::test]
    async fn test_submit_lists_every_missing_field() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/referrals",
                Some("tok-cm1"),
                Some(json!({"firstName": "Jane"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        for field in ["lastName", "dateOfBirth", "pmiNumber", "waiverType"] {
            assert!(error.contains(field), "{} not in '{}'", field, error);
        }
        assert!(!error.contains("firstName"));
    }

    #[tokio::test]
    async fn test_user_id_must_be_present_and_belong_to_caller() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(&app, request("GET", "/phi", Some("tok-cm1"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required query parameter: userId");

        let (status, _) = send(
            &app,
            request("GET", "/referrals?userId=cm-2", Some("tok-cm1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_phi_listing_filters_by_pmi_number() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);
        send(
            &app,
            request("POST", "/referrals", Some("tok-cm1"), Some(jane_doe())),
        )
        .await;

        let (status, body) = send(
            &app,
            request("GET", "/phi?userId=cm-1&pmiNumber=PMI-0001", Some("tok-cm1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["pmiNumber"], "PMI-0001");

        let (status, body) = send(
            &app,
            request("GET", "/phi?userId=cm-1&pmiNumber=PMI-9999", Some("tok-cm1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_case_manager_cannot_read_referral() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);
        let (_, body) = send(
            &app,
            request("POST", "/referrals", Some("tok-cm1"), Some(jane_doe())),
        )
        .await;
        let referral_id = body["data"]["referral"]["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            request("GET", &format!("/referrals/{}", referral_id), Some("tok-cm2"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            request(
                "PATCH",
                &format!("/referrals/{}/status", referral_id),
                Some("tok-cm2"),
                Some(json!({"status": "cancelled"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_provider_sees_open_referrals_without_phi() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);
        send(
            &app,
            request("POST", "/referrals", Some("tok-cm1"), Some(jane_doe())),
        )
        .await;

        let (status, body) = send(&app, request("GET", "/referrals", Some("tok-provider"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["data"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].get("firstName").is_none());

        let (status, _) = send(
            &app,
            request("POST", "/referrals", Some("tok-provider"), Some(jane_doe())),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, request("GET", "/referrals", Some("tok-nobody"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_status_update_moves_referral_between_buckets() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);
        let (_, body) = send(
            &app,
            request("POST", "/referrals", Some("tok-cm1"), Some(jane_doe())),
        )
        .await;
        let referral_id = body["data"]["referral"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            request(
                "PATCH",
                &format!("/referrals/{}/status", referral_id),
                Some("tok-cm1"),
                Some(json!({"status": "in-progress"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "in-progress");

        let (status, body) = send(
            &app,
            request("GET", "/dashboard?bucket=active&search=jane", Some("tok-cm1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["counts"]["active"], 1);
        assert_eq!(body["data"]["counts"]["pending"], 0);
        assert_eq!(body["data"]["cards"][0]["clientName"], "Jane Doe");
    }
}
