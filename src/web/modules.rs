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

const MODULE: &str = "Modules";

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

    let modules = storage::list_modules(&state.db).await?;
    Ok(Json(json!({ "modules": modules })))
}

async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let module = storage::get_module_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Module not found".to_string()))?;
    Ok(Json(json!({ "module": module })))
}

#[derive(Debug, Deserialize)]
struct ModuleRequest {
    name: String,
    description: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ModuleRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Create).await?;

    let module = storage::create_module(&state.db, &req.name, req.description.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Module created successfully with basic permissions",
            "module": module,
        })),
    )
        .into_response())
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<ModuleRequest>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let module = storage::update_module(&state.db, id, &req.name, req.description.as_deref()).await?;
    Ok(Json(
        json!({ "message": "Module updated successfully", "module": module }),
    ))
}

async fn destroy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Delete).await?;

    storage::delete_module(&state.db, id).await?;
    Ok(Json(json!({ "message": "Module deleted successfully" })))
}
