//! Policy gate: the single decision point in front of every guarded
//! operation. A request moves Unauthenticated -> Authenticated ->
//! Authorized/Forbidden; handlers call [`require_permission`] before doing
//! any work, so a denial never leaves partial effects behind.

use axum::http::HeaderMap;
use sea_orm::DatabaseConnection;

use crate::entities::permission::Action;
use crate::errors::GatehouseError;
use crate::resolver;
use crate::session::SessionCookie;
use crate::storage;

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
}

/// Resolve the session cookie to a live user.
pub async fn authenticate(
    db: &DatabaseConnection,
    headers: &HeaderMap,
) -> Result<Identity, GatehouseError> {
    let cookie = SessionCookie::from_headers(headers)
        .ok_or_else(|| GatehouseError::Unauthenticated("session cookie required".to_string()))?;

    let session = storage::get_session(db, &cookie.session_id)
        .await?
        .ok_or_else(|| {
            GatehouseError::Unauthenticated("invalid or expired session".to_string())
        })?;

    let user = storage::get_user(db, session.user_id).await?.ok_or_else(|| {
        GatehouseError::Unauthenticated("invalid or expired session".to_string())
    })?;

    Ok(Identity {
        user_id: user.id,
        username: user.username,
    })
}

/// Authenticate, then check the statically declared (module, action)
/// requirement against the resolver.
pub async fn require_permission(
    db: &DatabaseConnection,
    headers: &HeaderMap,
    module_name: &str,
    action: Action,
) -> Result<Identity, GatehouseError> {
    let identity = authenticate(db, headers).await?;

    if resolver::has_permission(db, identity.user_id, module_name, action).await? {
        Ok(identity)
    } else {
        Err(GatehouseError::Forbidden(format!(
            "insufficient permissions: {action} on {module_name}"
        )))
    }
}
