use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::coordinator;
use crate::entities::permission::Action;
use crate::errors::GatehouseError;
use crate::gate;
use crate::storage;

use super::AppState;

const MODULE: &str = "Roles";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/permissions", post(attach_permissions))
        .route(
            "/{id}/permissions/{permission_id}",
            delete(detach_permission),
        )
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let roles = storage::list_roles(&state.db).await?;
    Ok(Json(json!({ "roles": roles })))
}

async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let role = storage::get_role_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Role not found".to_string()))?;
    Ok(Json(json!({ "role": role })))
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    name: String,
    description: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RoleRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Create).await?;

    let role = storage::create_role(&state.db, &req.name, req.description.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Role created successfully", "role": role })),
    )
        .into_response())
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let role = storage::update_role(&state.db, id, &req.name, req.description.as_deref()).await?;
    Ok(Json(
        json!({ "message": "Role updated successfully", "role": role }),
    ))
}

async fn destroy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Delete).await?;

    storage::delete_role(&state.db, id).await?;
    Ok(Json(json!({ "message": "Role deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct AttachPermissionsRequest {
    permission_ids: Vec<i32>,
}

async fn attach_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<AttachPermissionsRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let report = coordinator::attach_permissions_to_role(&state.db, id, &req.permission_ids).await?;
    if !report.is_clean() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "attach_failed",
                "message": "Some permission assignments failed",
                "errors": report.errors,
            })),
        )
            .into_response());
    }

    let role = storage::get_role_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Role not found".to_string()))?;
    Ok(Json(json!({
        "message": "Permissions assigned to role successfully",
        "added": report.added,
        "role": role,
    }))
    .into_response())
}

async fn detach_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, permission_id)): Path<(i32, i32)>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    coordinator::detach_permission_from_role(&state.db, id, permission_id).await?;
    Ok(Json(
        json!({ "message": "Permission removed from role successfully" }),
    ))
}
