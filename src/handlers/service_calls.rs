use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::{require_membership, AuthUser};
use crate::models::*;
use crate::{scheduler, AppState};

use super::ApiError;

/// List a tenant's service calls, most recent first, with each item's
/// favorite flag resolved against the acting user's favorites.
pub async fn list_service_calls(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<ServiceCallSummary>>, ApiError> {
    require_membership(&state, &auth.user_id, &tenant_id).await?;

    let calls = state.store.get_service_calls(&tenant_id).await?;
    let favorites: HashSet<i64> = state
        .store
        .get_favorites(&auth.user_id)
        .await?
        .into_iter()
        .collect();

    let summaries = calls
        .iter()
        .map(|call| ServiceCallSummary::from_call(call, favorites.contains(&call.id)))
        .collect();
    Ok(Json(summaries))
}

/// Submit an HTTP service call. Persisted as PENDING, then either executed
/// immediately (the response detail comes back in the 201 body) or handed to
/// the scheduler (201 with no body, fire-and-forget).
pub async fn create_http_service_call(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(req): Json<CreateHttpServiceCallRequest>,
) -> Result<Response, ApiError> {
    require_membership(&state, &auth.user_id, &tenant_id).await?;

    if req.name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    if req.request.url.is_empty() {
        return Err(ApiError::bad_request("request.url is required"));
    }

    let created = state
        .store
        .create_service_call(
            &tenant_id,
            &req.name,
            req.scheduled_at,
            &ProtocolRequest::Http(req.request.clone()),
        )
        .await?;

    if let Some(scheduled_at) = req.scheduled_at {
        let executor = state.executor.clone();
        scheduler::schedule_at(scheduled_at, async move {
            executor.dispatch(&created).await;
        });
        return Ok(StatusCode::CREATED.into_response());
    }

    match state.executor.dispatch(&created).await {
        Some(response) => Ok((StatusCode::CREATED, Json(response)).into_response()),
        // Transport failure is recorded on the call, not raised here
        None => Ok(StatusCode::CREATED.into_response()),
    }
}

/// Fetch one HTTP service call with full request and response detail
pub async fn get_http_service_call(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((tenant_id, service_call_id)): Path<(String, i64)>,
) -> Result<Json<HttpServiceCallView>, ApiError> {
    require_membership(&state, &auth.user_id, &tenant_id).await?;

    let result = state
        .store
        .get_http_service_call(&tenant_id, service_call_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service call"))?;

    let ProtocolDetails::Http(details) = &result.details;
    Ok(Json(HttpServiceCallView::from_parts(
        &result.service_call,
        details,
    )))
}

pub async fn add_favorite(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((tenant_id, service_call_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    require_membership(&state, &auth.user_id, &tenant_id).await?;

    // Only tenant-visible calls can be favorited
    if state
        .store
        .get_http_service_call(&tenant_id, service_call_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Service call"));
    }

    state
        .store
        .add_favorite(&auth.user_id, service_call_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_favorite(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((tenant_id, service_call_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    require_membership(&state, &auth.user_id, &tenant_id).await?;

    state
        .store
        .remove_favorite(&auth.user_id, service_call_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
