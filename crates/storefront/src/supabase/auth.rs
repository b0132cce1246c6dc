//! Password authentication against the backend's auth endpoint.
//!
//! Sessions are token pairs: a short-lived access token that scopes REST
//! calls through row-level security, and a refresh token that mints new
//! access tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use choco_bliss_core::UserId;

use super::client::{Credential, SupabaseClient, parse_body};
use super::SupabaseError;

/// Treat tokens this close to expiry as already expired.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// The signed-in user as reported by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Profile data attached at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// An authenticated session.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl AuthSession {
    /// Whether the access token has expired (or is about to).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }

    /// Credential for REST calls made on this user's behalf.
    #[must_use]
    pub fn credential(&self) -> Credential<'_> {
        Credential::User(&self.access_token)
    }
}

/// Raw token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in.unwrap_or(3600)));

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up responses carry a session when email confirmation is disabled,
/// otherwise just the new user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpData<'a>,
}

#[derive(Serialize)]
struct SignUpData<'a> {
    full_name: &'a str,
}

impl SupabaseClient {
    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns `Api` with status 400 for bad credentials.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, SupabaseError> {
        let url = self.auth_endpoint("token?grant_type=password")?;
        let request = self
            .authorize(self.http().post(url), Credential::Anon)?
            .json(&PasswordGrant { email, password });

        let body = self.send(request).await?;
        let token: TokenResponse = parse_body(&body)?;
        let session = token.into_session(Utc::now());
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Register a new customer.
    ///
    /// Returns `None` when the account was created but must be confirmed
    /// by email before it can sign in.
    ///
    /// # Errors
    ///
    /// Returns `Api` when the backend rejects the registration (for
    /// example, the email is already registered or the password is weak).
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<AuthSession>, SupabaseError> {
        let url = self.auth_endpoint("signup")?;
        let request = self
            .authorize(self.http().post(url), Credential::Anon)?
            .json(&SignUpRequest {
                email,
                password,
                data: SignUpData { full_name },
            });

        let body = self.send(request).await?;
        match parse_body::<SignUpResponse>(&body)? {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now());
                info!(user_id = %session.user.id, "Signed up");
                Ok(Some(session))
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "Signed up, awaiting email confirmation");
                Ok(None)
            }
        }
    }

    /// Mint a fresh session from a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh token is invalid or revoked.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, SupabaseError> {
        let url = self.auth_endpoint("token?grant_type=refresh_token")?;
        let request = self
            .authorize(self.http().post(url), Credential::Anon)?
            .json(&RefreshGrant { refresh_token });

        let body = self.send(request).await?;
        let token: TokenResponse = parse_body(&body)?;
        let session = token.into_session(Utc::now());
        debug!(user_id = %session.user.id, "Session refreshed");
        Ok(session)
    }

    /// Revoke the session's refresh tokens.
    ///
    /// Failures are logged and swallowed; the local session is dropped
    /// regardless.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) {
        if let Err(e) = self.revoke(access_token).await {
            warn!(error = %e, "Sign-out request failed");
        }
    }

    async fn revoke(&self, access_token: &str) -> Result<(), SupabaseError> {
        let url = self.auth_endpoint("logout")?;
        let request = self.authorize(self.http().post(url), Credential::User(access_token))?;
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOKEN_JSON: &str = r#"{
        "access_token": "eyJhbGciOi.access",
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1740823200,
        "refresh_token": "r3fr3sh",
        "user": {
            "id": "6f1c1c3c-6a2e-4f0e-8a0e-1c2d3e4f5a6b",
            "email": "devi@example.com",
            "user_metadata": {"full_name": "Devi Shah"}
        }
    }"#;

    #[test]
    fn test_token_response_uses_absolute_expiry() {
        let token: TokenResponse = serde_json::from_str(TOKEN_JSON).unwrap();
        let session = token.into_session(Utc::now());
        assert_eq!(session.expires_at.timestamp(), 1_740_823_200);
        assert_eq!(session.user.email.as_deref(), Some("devi@example.com"));
        assert_eq!(
            session.user.user_metadata.full_name.as_deref(),
            Some("Devi Shah")
        );
    }

    #[test]
    fn test_token_response_falls_back_to_expires_in() {
        let json = r#"{
            "access_token": "a", "refresh_token": "r", "expires_in": 60,
            "user": {"id": "6f1c1c3c-6a2e-4f0e-8a0e-1c2d3e4f5a6b"}
        }"#;
        let now = Utc::now();
        let session = serde_json::from_str::<TokenResponse>(json)
            .unwrap()
            .into_session(now);
        assert_eq!(session.expires_at, now + Duration::seconds(60));
        assert!(session.user.user_metadata.full_name.is_none());
    }

    #[test]
    fn test_expiry_leeway() {
        let now = Utc::now();
        let mut session = serde_json::from_str::<TokenResponse>(TOKEN_JSON)
            .unwrap()
            .into_session(now);

        session.expires_at = now + Duration::seconds(10);
        assert!(session.is_expired_at(now));

        session.expires_at = now + Duration::seconds(600);
        assert!(!session.is_expired_at(now));
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let with_session: SignUpResponse = serde_json::from_str(TOKEN_JSON).unwrap();
        assert!(matches!(with_session, SignUpResponse::Session(_)));

        let pending: SignUpResponse = serde_json::from_str(
            r#"{"id": "6f1c1c3c-6a2e-4f0e-8a0e-1c2d3e4f5a6b", "email": "devi@example.com"}"#,
        )
        .unwrap();
        assert!(matches!(pending, SignUpResponse::User(_)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let session = serde_json::from_str::<TokenResponse>(TOKEN_JSON)
            .unwrap()
            .into_session(Utc::now());
        let debug = format!("{session:?}");
        assert!(!debug.contains("r3fr3sh"));
        assert!(!debug.contains("eyJhbGciOi"));
    }
}
