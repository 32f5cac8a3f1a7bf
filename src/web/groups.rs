use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::coordinator::{self, AttachReport};
use crate::entities::permission::Action;
use crate::errors::GatehouseError;
use crate::gate;
use crate::storage;

use super::AppState;

const MODULE: &str = "Groups";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/users", post(attach_users))
        .route("/{id}/users/{user_id}", delete(detach_user))
        .route("/{id}/roles", post(attach_roles))
        .route("/{id}/roles/{role_id}", delete(detach_role))
}

/// 400 carrying the per-item failures of a bulk attach.
fn attach_failed(report: &AttachReport) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "attach_failed",
            "message": "Some assignments failed",
            "errors": report.errors,
        })),
    )
        .into_response()
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let groups = storage::list_groups(&state.db).await?;
    Ok(Json(json!({ "groups": groups })))
}

async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let group = storage::get_group_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;
    Ok(Json(json!({ "group": group })))
}

#[derive(Debug, Deserialize)]
struct GroupRequest {
    name: String,
    description: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GroupRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Create).await?;

    let group = storage::create_group(&state.db, &req.name, req.description.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Group created successfully", "group": group })),
    )
        .into_response())
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<GroupRequest>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    storage::update_group(&state.db, id, &req.name, req.description.as_deref()).await?;
    let group = storage::get_group_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;
    Ok(Json(
        json!({ "message": "Group updated successfully", "group": group }),
    ))
}

async fn destroy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Delete).await?;

    storage::delete_group(&state.db, id).await?;
    Ok(Json(json!({ "message": "Group deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct AttachUsersRequest {
    user_ids: Vec<i32>,
}

async fn attach_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<AttachUsersRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let report = coordinator::attach_users_to_group(&state.db, id, &req.user_ids).await?;
    if !report.is_clean() {
        return Ok(attach_failed(&report));
    }

    let group = storage::get_group_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;
    Ok(Json(json!({
        "message": format!("{} users assigned to group successfully", report.added),
        "added": report.added,
        "group": group,
    }))
    .into_response())
}

async fn detach_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, user_id)): Path<(i32, i32)>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    coordinator::detach_user_from_group(&state.db, id, user_id).await?;
    Ok(Json(
        json!({ "message": "User removed from group successfully" }),
    ))
}

#[derive(Debug, Deserialize)]
struct AttachRolesRequest {
    role_ids: Vec<i32>,
}

async fn attach_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<AttachRolesRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let report = coordinator::attach_roles_to_group(&state.db, id, &req.role_ids).await?;
    if !report.is_clean() {
        return Ok(attach_failed(&report));
    }

    let group = storage::get_group_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;
    Ok(Json(json!({
        "message": "Roles assigned to group successfully",
        "added": report.added,
        "group": group,
    }))
    .into_response())
}

async fn detach_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, role_id)): Path<(i32, i32)>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    coordinator::detach_role_from_group(&state.db, id, role_id).await?;
    Ok(Json(
        json!({ "message": "Role removed from group successfully" }),
    ))
}
