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

const MODULE: &str = "Users";

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

    let users = storage::list_users(&state.db).await?;
    Ok(Json(json!({ "users": users })))
}

async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Read).await?;

    let user = storage::get_user_detail(&state.db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("User not found".to_string()))?;
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    username: String,
    email: String,
    password: String,
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<Response, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Create).await?;

    let user = storage::create_user(&state.db, &req.username, &req.email, &req.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Update).await?;

    let user = storage::update_user(
        &state.db,
        id,
        req.username.as_deref(),
        req.email.as_deref(),
        req.password.as_deref(),
    )
    .await?;
    Ok(Json(
        json!({ "message": "User updated successfully", "user": user }),
    ))
}

async fn destroy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    gate::require_permission(&state.db, &headers, MODULE, Action::Delete).await?;

    storage::delete_user(&state.db, id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
