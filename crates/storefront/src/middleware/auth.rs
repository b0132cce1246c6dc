//! Authentication middleware and extractors.
//!
//! The session holds the backend [`AuthSession`]. Extractors hand it to
//! handlers, refreshing the access token first when it has expired.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::middleware::flash::push_flash;
use crate::models::{Flash, session_keys};
use crate::state::AppState;
use crate::supabase::AuthSession;

/// Where login-required pages send anonymous visitors.
pub const LOGIN_PATH: &str = "/auth/login";

/// Extractor that requires a signed-in customer.
///
/// If nobody is signed in (or the session can no longer be refreshed),
/// returns a redirect to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn cart_page(
///     State(state): State<AppState>,
///     RequireAuth(auth): RequireAuth,
/// ) -> Result<impl IntoResponse> {
///     let items = state.supabase().cart_items(auth.credential(), auth.user.id).await?;
///     // ...
/// }
/// ```
pub struct RequireAuth(pub AuthSession);

/// Error returned when authentication is required but nobody is signed in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (no session layer).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)?;

        let app_state = AppState::from_ref(state);
        load_fresh_session(&session, &app_state)
            .await
            .map(Self)
            .ok_or(AuthRejection::RedirectToLogin)
    }
}

/// Extractor that optionally gets the signed-in customer.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<AuthSession>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self(None));
        };

        let app_state = AppState::from_ref(state);
        Ok(Self(load_fresh_session(&session, &app_state).await))
    }
}

/// Read the stored auth session, refreshing it if the access token expired.
///
/// A session whose refresh fails is dropped.
async fn load_fresh_session(session: &Session, state: &AppState) -> Option<AuthSession> {
    let auth: AuthSession = session
        .get(session_keys::AUTH_SESSION)
        .await
        .ok()
        .flatten()?;

    if !auth.is_expired() {
        return Some(auth);
    }

    match state.supabase().refresh_session(&auth.refresh_token).await {
        Ok(fresh) => {
            debug!(user_id = %fresh.user.id, "Refreshed expired access token");
            if let Err(e) = set_auth_session(session, &fresh).await {
                warn!(error = %e, "Failed to store refreshed session");
            }
            Some(fresh)
        }
        Err(e) => {
            warn!(error = %e, user_id = %auth.user.id, "Session refresh failed");
            if let Err(e) = clear_auth_session(session).await {
                warn!(error = %e, "Failed to clear expired session");
            }
            let flash = Flash::info("Your session has expired, please sign in again");
            if let Err(e) = push_flash(session, flash).await {
                warn!(error = %e, "Failed to store session expiry notice");
            }
            None
        }
    }
}

/// Helper to store the auth session (login, refresh).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_auth_session(
    session: &Session,
    auth: &AuthSession,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::AUTH_SESSION, auth).await
}

/// Helper to clear the auth session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_auth_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<AuthSession>(session_keys::AUTH_SESSION)
        .await?;
    Ok(())
}
