use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::entities::permission::Action;
use crate::errors::GatehouseError;
use crate::gate;
use crate::resolver;
use crate::session::SessionCookie;
use crate::storage;

use super::AppState;

pub fn router(allow_public_registration: bool) -> Router<AppState> {
    let mut router = Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me/permissions", get(me_permissions))
        .route("/simulate-action", post(simulate_action));

    if allow_public_registration {
        router = router.route("/register", post(register));
    }
    router
}

fn set_cookie(response: &mut Response, value: String) -> Result<(), GatehouseError> {
    let value = HeaderValue::from_str(&value)
        .map_err(|_| GatehouseError::Other("invalid cookie header".to_string()))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, GatehouseError> {
    let user = storage::create_user(&state.db, &req.username, &req.email, &req.password).await?;
    let session =
        storage::create_session(&state.db, user.id, state.settings.auth.session_ttl_secs).await?;

    let mut response = (
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": user })),
    )
        .into_response();
    let cookie = SessionCookie::new(session.session_id);
    set_cookie(
        &mut response,
        cookie.to_cookie_header(state.settings.auth.session_ttl_secs),
    )?;
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, GatehouseError> {
    let user = storage::verify_user_password(&state.db, &req.username, &req.password)
        .await?
        .ok_or_else(|| GatehouseError::Unauthenticated("Invalid credentials".to_string()))?;

    let session =
        storage::create_session(&state.db, user.id, state.settings.auth.session_ttl_secs).await?;

    let mut response = Json(json!({ "message": "Login successful", "user": user })).into_response();
    let cookie = SessionCookie::new(session.session_id);
    set_cookie(
        &mut response,
        cookie.to_cookie_header(state.settings.auth.session_ttl_secs),
    )?;
    Ok(response)
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GatehouseError> {
    if let Some(cookie) = SessionCookie::from_headers(&headers) {
        storage::delete_session(&state.db, &cookie.session_id).await?;
    }

    let mut response = Json(json!({ "message": "Logged out" })).into_response();
    set_cookie(&mut response, SessionCookie::delete_cookie_header())?;
    Ok(response)
}

async fn me_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    let identity = gate::authenticate(&state.db, &headers).await?;
    let permissions = resolver::effective_permissions(&state.db, identity.user_id).await?;
    Ok(Json(json!({ "permissions": permissions })))
}

#[derive(Debug, Deserialize)]
struct SimulateActionRequest {
    module_name: String,
    action: String,
    user_id: Option<i32>,
}

/// Dry-run a permission check for the caller or an explicit target user.
async fn simulate_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SimulateActionRequest>,
) -> Result<Json<serde_json::Value>, GatehouseError> {
    let identity = gate::authenticate(&state.db, &headers).await?;

    let action: Action = req.action.parse()?;
    let target_user_id = req.user_id.unwrap_or(identity.user_id);

    let has_permission =
        resolver::has_permission(&state.db, target_user_id, &req.module_name, action).await?;

    let message = if has_permission {
        format!("User has permission to {} on {}", action, req.module_name)
    } else {
        format!(
            "User does not have permission to {} on {}",
            action, req.module_name
        )
    };

    Ok(Json(json!({
        "has_permission": has_permission,
        "message": message,
    })))
}
