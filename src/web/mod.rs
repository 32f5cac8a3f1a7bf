//! HTTP surface. Every guarded route declares its (module, action)
//! requirement and evaluates the policy gate before touching the store.

pub mod auth;
pub mod groups;
pub mod modules;
pub mod permissions;
pub mod roles;
pub mod users;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let state = AppState {
        settings: Arc::new(settings),
        db,
    };

    let router = Router::new()
        .nest(
            "/api/auth",
            auth::router(state.settings.server.allow_public_registration),
        )
        .nest("/api/users", users::router())
        .nest("/api/groups", groups::router())
        .nest("/api/roles", roles::router())
        .nest("/api/modules", modules::router())
        .nest("/api/permissions", permissions::router())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if state.settings.server.allow_public_registration {
        tracing::info!("Public user registration is ENABLED");
    } else {
        tracing::info!("Public user registration is DISABLED - admins create accounts");
    }

    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    tracing::info!(%addr, "Access control API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "message": "Route not found" })),
    )
}
