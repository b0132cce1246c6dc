//! Session-related types.
//!
//! Types stored in the session for authentication state and one-shot
//! notifications.

use serde::{Deserialize, Serialize};

use choco_bliss_core::UserId;

use crate::supabase::AuthSession;

/// Display identity of the signed-in customer.
///
/// Derived from the stored [`AuthSession`]; never carries tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Auth user id (also the profile id).
    pub id: UserId,
    /// Email address, when the backend reports one.
    pub email: Option<String>,
    /// Name given at sign-up.
    pub full_name: Option<String>,
}

impl CurrentUser {
    /// Name to greet the customer with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Customer")
    }
}

impl From<&AuthSession> for CurrentUser {
    fn from(session: &AuthSession) -> Self {
        Self {
            id: session.user.id,
            email: session.user.email.clone(),
            full_name: session.user.user_metadata.full_name.clone(),
        }
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    /// CSS modifier class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for the backend auth session (tokens + user).
    pub const AUTH_SESSION: &str = "auth_session";

    /// Key for pending flash messages.
    pub const FLASH: &str = "flash";

    /// Key for the last shipping form, so validation errors keep input.
    pub const SHIPPING_DRAFT: &str = "shipping_draft";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_full_name() {
        let mut user = CurrentUser {
            id: UserId::generate(),
            email: Some("devi@example.com".to_string()),
            full_name: Some("Devi Shah".to_string()),
        };
        assert_eq!(user.display_name(), "Devi Shah");

        user.full_name = Some(String::new());
        assert_eq!(user.display_name(), "devi@example.com");

        user.email = None;
        assert_eq!(user.display_name(), "Customer");
    }

    #[test]
    fn test_flash_serializes_kind_lowercase() {
        let json = serde_json::to_string(&Flash::error("Payment cancelled")).ok();
        assert_eq!(
            json.as_deref(),
            Some(r#"{"kind":"error","message":"Payment cancelled"}"#)
        );
    }
}
