//! Authentication route handlers.
//!
//! Sign-in, sign-up, and sign-out are delegated to the backend's auth
//! endpoint. The resulting token pair is stored in the server-side session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{Flashes, OptionalAuth, clear_auth_session, set_auth_session};
use crate::models::{Flash, session_keys};
use crate::routes::flash_redirect;
use crate::routes::layout::Layout;
use crate::services::{AuthError, Registration};
use crate::state::AppState;
use crate::supabase::AuthSession;

/// Where customers land after signing in.
const AFTER_LOGIN_PATH: &str = "/products";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    flashes: Flashes,
) -> Response {
    if auth.is_some() {
        return Redirect::to("/account").into_response();
    }
    LoginTemplate {
        layout: Layout::new(&state, None, flashes),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth().login(&form.email, &form.password).await {
        Ok(auth) => start_session(&session, &auth, Flash::success("Welcome back!")).await,
        Err(e) => {
            if matches!(e, AuthError::Backend(_)) {
                error!(error = %e, "Login failed");
            } else {
                info!(error = %e, "Login rejected");
            }
            flash_redirect(&session, Flash::error(e.user_message()), "/auth/login").await
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    flashes: Flashes,
) -> Response {
    if auth.is_some() {
        return Redirect::to("/account").into_response();
    }
    RegisterTemplate {
        layout: Layout::new(&state, None, flashes),
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    match state
        .auth()
        .register(&form.full_name, &form.email, &form.password)
        .await
    {
        Ok(Registration::SignedIn(auth)) => {
            start_session(&session, &auth, Flash::success("Account created!")).await
        }
        Ok(Registration::ConfirmationRequired) => {
            flash_redirect(
                &session,
                Flash::info("Account created! Check your email to confirm it, then sign in."),
                "/auth/login",
            )
            .await
        }
        Err(e) => {
            if matches!(e, AuthError::Backend(_)) {
                error!(error = %e, "Registration failed");
            } else {
                info!(error = %e, "Registration rejected");
            }
            flash_redirect(&session, Flash::error(e.user_message()), "/auth/register").await
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// Revokes the refresh token upstream and forgets the local session. Local
/// sign-out happens even when the revoke call fails.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Response {
    if let Some(auth) = auth {
        state.supabase().sign_out(&auth.access_token).await;
        info!(user_id = %auth.user.id, "Signed out");
    }

    if let Err(e) = clear_auth_session(&session).await {
        warn!(error = %e, "Failed to clear auth session");
    }
    if let Err(e) = session
        .remove::<serde_json::Value>(session_keys::SHIPPING_DRAFT)
        .await
    {
        warn!(error = %e, "Failed to drop shipping draft");
    }
    if let Err(e) = session.cycle_id().await {
        warn!(error = %e, "Failed to cycle session id");
    }
    clear_sentry_user();

    flash_redirect(&session, Flash::info("You have been signed out"), "/").await
}

/// Store a fresh sign-in under a new session id and redirect.
async fn start_session(session: &Session, auth: &AuthSession, welcome: Flash) -> Response {
    if let Err(e) = session.cycle_id().await {
        warn!(error = %e, "Failed to cycle session id");
    }

    if let Err(e) = set_auth_session(session, auth).await {
        error!(error = %e, "Failed to store auth session");
        return flash_redirect(
            session,
            Flash::error("Something went wrong, please try again"),
            "/auth/login",
        )
        .await;
    }

    set_sentry_user(&auth.user.id, auth.user.email.as_deref());
    info!(user_id = %auth.user.id, "Signed in");

    flash_redirect(session, welcome, AFTER_LOGIN_PATH).await
}
