use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(axum::http::StatusCode, Json<User>), ApiError> {
    if req.id.is_empty() || req.tenant_id.is_empty() {
        return Err(ApiError::bad_request("id and tenantId are required"));
    }

    let user = state.store.create_user(&req.id, &req.tenant_id).await?;
    Ok(created(user))
}

/// Sign-in resolves a user id to the user with its full tenant set. The
/// upstream layer authenticates; this only looks the identity up.
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserIdRequest>,
) -> Result<Json<UserWithTenants>, ApiError> {
    let user = state
        .store
        .get_user(&req.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<axum::http::StatusCode, ApiError> {
    state.store.delete_user(&user_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
