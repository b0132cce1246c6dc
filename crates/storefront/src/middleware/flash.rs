//! One-shot flash messages ("toasts").
//!
//! Handlers push a message before redirecting; the next rendered page takes
//! every pending message out of the session and shows it once.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use tower_sessions::Session;

use crate::models::{Flash, session_keys};

/// Maximum pending messages kept in a session.
const MAX_PENDING: usize = 5;

/// Queue a flash message for the next page.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn push_flash(session: &Session, flash: Flash) -> Result<(), tower_sessions::session::Error> {
    let mut pending: Vec<Flash> = session
        .get(session_keys::FLASH)
        .await?
        .unwrap_or_default();
    pending.push(flash);
    if pending.len() > MAX_PENDING {
        pending.drain(..pending.len() - MAX_PENDING);
    }
    session.insert(session_keys::FLASH, pending).await
}

/// Extractor that takes all pending flash messages out of the session.
pub struct Flashes(pub Vec<Flash>);

impl<S> FromRequestParts<S> for Flashes
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self(Vec::new()));
        };

        let pending = session
            .remove::<Vec<Flash>>(session_keys::FLASH)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        Ok(Self(pending))
    }
}
