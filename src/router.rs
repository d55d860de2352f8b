use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        // Tenant routes
        .route("/api/tenants", get(handlers::tenants::list_tenants))
        .route("/api/tenants", post(handlers::tenants::create_tenant))
        .route("/api/tenants/:tenant_id", delete(handlers::tenants::delete_tenant))
        // User routes
        .route("/api/users", post(handlers::users::create_user))
        .route("/api/users/signin", post(handlers::users::signin))
        .route("/api/users/:user_id", delete(handlers::users::delete_user))
        // Membership routes
        .route("/api/tenants/:tenant_id/users", put(handlers::tenants::add_user_to_tenant))
        .route("/api/tenants/:tenant_id/users/:user_id", delete(handlers::tenants::remove_user_from_tenant))
        // Service call routes (tenant-scoped, gated on membership)
        .route("/api/tenants/:tenant_id/service-calls", get(handlers::service_calls::list_service_calls))
        .route("/api/tenants/:tenant_id/service-calls/http", post(handlers::service_calls::create_http_service_call))
        .route("/api/tenants/:tenant_id/service-calls/http/:service_call_id", get(handlers::service_calls::get_http_service_call))
        .route("/api/tenants/:tenant_id/service-calls/:service_call_id/favorite", put(handlers::service_calls::add_favorite))
        .route("/api/tenants/:tenant_id/service-calls/:service_call_id/favorite", delete(handlers::service_calls::remove_favorite))
        // Healthcheck
        .route("/api/health", get(handlers::healthcheck))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{test_store, Store};
    use crate::executor::ServiceCallExecutor;
    use crate::models::ServiceCallStatus;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Store) {
        let store = test_store().await;
        let executor = ServiceCallExecutor::new(store.clone(), Duration::from_secs(5)).unwrap();
        let state = Arc::new(AppState {
            store: store.clone(),
            config: Config::load(),
            executor,
        });
        (build(state), store)
    }

    #[tokio::test]
    async fn submitted_call_returns_captured_response_and_lands_executed() {
        let (app, store) = test_app().await;
        store.create_tenant("t1").await.unwrap();
        store.create_user("u1", "t1").await.unwrap();

        let payload = serde_json::json!({
            "name": "demo",
            "request": { "url": "http://example.com/api", "method": "GET" }
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tenants/t1/service-calls/http")
                    .header("x-user-id", "u1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["responseCode"], 200);
        assert_eq!(body["responseBody"], r#"{"message": "Success"}"#);

        let calls = store.get_service_calls("t1").await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, ServiceCallStatus::Executed);
        assert!(calls[0].executed_at.is_some());
    }

    #[tokio::test]
    async fn tenant_scoped_routes_reject_requests_without_identity() {
        let (app, store) = test_app().await;
        store.create_tenant("t1").await.unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tenants/t1/service-calls")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_as_non_member_reads_as_absent_tenant() {
        let (app, store) = test_app().await;
        store.create_tenant("t1").await.unwrap();
        store.create_tenant("t2").await.unwrap();
        store.create_user("u1", "t1").await.unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tenants/t2/service-calls")
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
