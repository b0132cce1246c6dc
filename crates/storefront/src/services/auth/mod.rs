//! Authentication service.
//!
//! Validates input locally, then delegates sign-in and registration to the
//! backend's auth endpoint and translates its error codes.

mod error;

pub use error::AuthError;

use choco_bliss_core::Email;

use crate::supabase::{AuthSession, SupabaseClient, SupabaseError};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length accepted by the backend.
const MAX_PASSWORD_LENGTH: usize = 72;

/// Maximum length of a display name.
const MAX_NAME_LENGTH: usize = 100;

/// Result of a registration.
#[derive(Debug)]
pub enum Registration {
    /// Signed in straight away.
    SignedIn(AuthSession),
    /// Account created; the customer must confirm their email first.
    ConfirmationRequired,
}

/// Authentication service.
pub struct AuthService<'a> {
    supabase: &'a SupabaseClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(supabase: &'a SupabaseClient) -> Self {
        Self { supabase }
    }

    /// Register a new customer with name, email, and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, AuthError> {
        let full_name = validate_name(full_name)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        let session = self
            .supabase
            .sign_up(email.as_str(), password, full_name)
            .await
            .map_err(map_sign_up_error)?;

        Ok(session.map_or(Registration::ConfirmationRequired, Registration::SignedIn))
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        self.supabase
            .sign_in_with_password(email.as_str(), password)
            .await
            .map_err(map_sign_in_error)
    }
}

fn map_sign_in_error(err: SupabaseError) -> AuthError {
    match err {
        SupabaseError::Api { code, .. } if code.as_deref() == Some("email_not_confirmed") => {
            AuthError::EmailNotConfirmed
        }
        SupabaseError::Api { status: 400, .. } | SupabaseError::Unauthorized(_) => {
            AuthError::InvalidCredentials
        }
        other => AuthError::Backend(other),
    }
}

fn map_sign_up_error(err: SupabaseError) -> AuthError {
    match err {
        SupabaseError::Api { code, message, .. }
            if matches!(code.as_deref(), Some("user_already_exists" | "email_exists"))
                || message.contains("already registered") =>
        {
            AuthError::UserAlreadyExists
        }
        SupabaseError::Api { code, message, .. } if code.as_deref() == Some("weak_password") => {
            AuthError::WeakPassword(message)
        }
        other => AuthError::Backend(other),
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("Please enter your name".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "Name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(73)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Devi Shah ").ok(), Some("Devi Shah"));
        assert!(matches!(validate_name("   "), Err(AuthError::InvalidName(_))));
        assert!(validate_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_sign_in_errors() {
        let bad_password = SupabaseError::Api {
            status: 400,
            code: Some("invalid_grant".to_string()),
            message: "Invalid login credentials".to_string(),
        };
        assert!(matches!(
            map_sign_in_error(bad_password),
            AuthError::InvalidCredentials
        ));

        let unconfirmed = SupabaseError::Api {
            status: 400,
            code: Some("email_not_confirmed".to_string()),
            message: "Email not confirmed".to_string(),
        };
        assert!(matches!(
            map_sign_in_error(unconfirmed),
            AuthError::EmailNotConfirmed
        ));

        assert!(matches!(
            map_sign_in_error(SupabaseError::RateLimited(5)),
            AuthError::Backend(_)
        ));
    }

    #[test]
    fn test_sign_up_errors() {
        let exists = SupabaseError::Api {
            status: 422,
            code: Some("422".to_string()),
            message: "User already registered".to_string(),
        };
        assert!(matches!(
            map_sign_up_error(exists),
            AuthError::UserAlreadyExists
        ));

        let weak = SupabaseError::Api {
            status: 422,
            code: Some("weak_password".to_string()),
            message: "Password should contain a digit".to_string(),
        };
        assert!(
            matches!(map_sign_up_error(weak), AuthError::WeakPassword(m) if m.contains("digit"))
        );
    }

    #[test]
    fn test_user_messages_hide_backend_details() {
        let err = AuthError::Backend(SupabaseError::NotFound("secret table".to_string()));
        assert!(!err.user_message().contains("secret"));
    }
}
