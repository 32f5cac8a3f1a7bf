use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GatehouseError {
    #[error("{0}")]
    #[diagnostic(code(gatehouse::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::conflict))]
    Conflict(String),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::invalid_argument))]
    InvalidArgument(String),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::unauthenticated))]
    Unauthenticated(String),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::forbidden))]
    Forbidden(String),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::dependency_in_use))]
    DependencyInUse(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(gatehouse::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    #[diagnostic(code(gatehouse::config))]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(gatehouse::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(gatehouse::serde))]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::other))]
    Other(String),
}

impl GatehouseError {
    /// Stable machine-readable kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            GatehouseError::NotFound(_) => "not_found",
            GatehouseError::Conflict(_) => "conflict",
            GatehouseError::InvalidArgument(_) => "invalid_argument",
            GatehouseError::Unauthenticated(_) => "unauthenticated",
            GatehouseError::Forbidden(_) => "forbidden",
            GatehouseError::DependencyInUse(_) => "dependency_in_use",
            _ => "internal",
        }
    }
}

impl IntoResponse for GatehouseError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatehouseError::NotFound(_) => StatusCode::NOT_FOUND,
            GatehouseError::Conflict(_) => StatusCode::CONFLICT,
            GatehouseError::InvalidArgument(_) | GatehouseError::DependencyInUse(_) => {
                StatusCode::BAD_REQUEST
            }
            GatehouseError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatehouseError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Store/config/io error text never reaches the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = json!({ "error": self.kind(), "message": message });
        (status, Json(body)).into_response()
    }
}
