use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

pub async fn list_tenants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Tenant>>, ApiError> {
    let tenants = state.store.list_tenants().await?;
    Ok(Json(tenants))
}

pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTenantRequest>,
) -> Result<(axum::http::StatusCode, Json<Tenant>), ApiError> {
    if req.id.is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }

    let tenant = state.store.create_tenant(&req.id).await?;
    Ok(created(tenant))
}

pub async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<axum::http::StatusCode, ApiError> {
    state.store.delete_tenant(&tenant_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Add an existing user to a tenant
pub async fn add_user_to_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(req): Json<UserIdRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    if req.id.is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }

    state.store.add_user_to_tenant(&req.id, &tenant_id).await?;
    Ok(axum::http::StatusCode::CREATED)
}

/// Remove a user's membership. Rejected when it is the user's last one.
pub async fn remove_user_from_tenant(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, user_id)): Path<(String, String)>,
) -> Result<axum::http::StatusCode, ApiError> {
    state
        .store
        .remove_user_from_tenant(&user_id, &tenant_id)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
