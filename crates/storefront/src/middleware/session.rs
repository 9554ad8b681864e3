//! Session middleware configuration and the shopper extractor.
//!
//! The session only carries an anonymous shopper id; carts live in the
//! [`SessionRegistry`](crate::session::SessionRegistry) under that id.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::debug;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::error::AppError;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ququ_session";

/// Session key holding the shopper id.
pub const SHOPPER_ID_KEY: &str = "shopper_id";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    let is_secure = config.base_url.scheme() == "https";

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Get the shopper id from the session, assigning a new one on first visit.
///
/// # Errors
///
/// Returns error if the session store fails.
pub async fn shopper_id(session: &Session) -> Result<Uuid, AppError> {
    if let Some(id) = session
        .get::<Uuid>(SHOPPER_ID_KEY)
        .await
        .map_err(|e| AppError::Internal(format!("session read failed: {e}")))?
    {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    session
        .insert(SHOPPER_ID_KEY, id)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    debug!(shopper = %id, "New shopper");
    Ok(id)
}

/// Extractor for the anonymous shopper behind a request.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Shopper(id): Shopper) -> String {
///     id.to_string()
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Shopper(pub Uuid);

impl<S> FromRequestParts<S> for Shopper
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let id = shopper_id(&session).await?;
        sentry::configure_scope(|scope| {
            scope.set_tag("shopper_id", id);
        });
        Ok(Self(id))
    }
}
