use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::entities::permission::Action;
use crate::errors::GatehouseError;
use crate::gate;
use crate::storage;

use super::AppState;

const MODULE: &str = "Permissions";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let permissions = storage::list_permissions(&state.db).await?;
    Ok(Json(json!({ "permissions": permissions })))
}

async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let permission = storage::get_permission_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Permission not found".to_string()))?;
    Ok(Json(json!({ "permission": permission })))
}

#[derive(Debug, Deserialize)]
struct PermissionRequest {
    name: String,
    action: String,
    module_id: i32,
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PermissionRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Create).await?;

    let action: Action = req.action.parse()?;
    let permission =
        storage::create_permission(&state.db, &req.name, action, req.module_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Permission created successfully",
            "permission": permission,
        })),
    )
        .into_response())
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<PermissionRequest>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let action: Action = req.action.parse()?;
    let permission =
        storage::update_permission(&state.db, id, &req.name, action, req.module_id).await?;
    Ok(Json(json!({
        "message": "Permission updated successfully",
        "permission": permission,
    })))
}

async fn destroy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Delete).await?;

    storage::delete_permission(&state.db, id).await?;
    Ok(Json(json!({ "message": "Permission deleted successfully" })))
}
