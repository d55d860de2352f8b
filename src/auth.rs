use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::handlers::{ApiError, ErrorResponse};
use crate::AppState;

/// Extractor that resolves the acting user from the `x-user-id` header set
/// by the upstream authentication layer. The core never parses credentials;
/// it only receives already-extracted identifiers.
///
/// Add `auth: AuthUser` to a handler's parameters to require an identity.
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingUserId)?;

        Ok(AuthUser {
            user_id: user_id.to_string(),
        })
    }
}

pub enum AuthError {
    MissingUserId,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingUserId => (
                StatusCode::BAD_REQUEST,
                "Missing or malformed x-user-id header",
            ),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Verify the acting user belongs to the tenant before a tenant-scoped
/// operation proceeds. A non-member gets the same "not found" a missing
/// tenant would, deliberately not leaking tenant existence.
pub async fn require_membership(
    state: &AppState,
    user_id: &str,
    tenant_id: &str,
) -> Result<(), ApiError> {
    if state.store.is_user_in_tenant(user_id, tenant_id).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("Tenant"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_store;
    use crate::executor::ServiceCallExecutor;
    use axum::http::Request;
    use std::time::Duration;

    async fn test_state() -> Arc<AppState> {
        let store = test_store().await;
        let executor = ServiceCallExecutor::new(store.clone(), Duration::from_secs(5)).unwrap();
        Arc::new(AppState {
            store,
            config: Config::load(),
            executor,
        })
    }

    async fn extract(req: Request<()>, state: &Arc<AppState>) -> Result<AuthUser, AuthError> {
        let (mut parts, _) = req.into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn missing_or_empty_user_header_is_a_bad_request() {
        let state = test_state().await;

        let bare = Request::builder().uri("/").body(()).unwrap();
        let rejection = match extract(bare, &state).await {
            Ok(_) => panic!("expected rejection"),
            Err(e) => e,
        };
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::BAD_REQUEST
        );

        let empty = Request::builder()
            .uri("/")
            .header("x-user-id", "")
            .body(())
            .unwrap();
        assert!(extract(empty, &state).await.is_err());

        let present = Request::builder()
            .uri("/")
            .header("x-user-id", "u1")
            .body(())
            .unwrap();
        let auth = extract(present, &state).await;
        assert_eq!(auth.ok().map(|a| a.user_id), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn non_member_and_absent_tenant_are_indistinguishable() {
        let state = test_state().await;
        state.store.create_tenant("t1").await.unwrap();
        state.store.create_tenant("t2").await.unwrap();
        state.store.create_user("u1", "t1").await.unwrap();

        assert!(require_membership(&state, "u1", "t1").await.is_ok());

        let foreign = require_membership(&state, "u1", "t2")
            .await
            .unwrap_err()
            .into_response();
        let absent = require_membership(&state, "u1", "nowhere")
            .await
            .unwrap_err()
            .into_response();

        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);

        let foreign_body = axum::body::to_bytes(foreign.into_body(), usize::MAX)
            .await
            .unwrap();
        let absent_body = axum::body::to_bytes(absent.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(foreign_body, absent_body);
        assert_eq!(foreign_body.as_ref(), br#"{"error":"Tenant not found"}"#);
    }
}
