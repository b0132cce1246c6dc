//! Data every page's base template renders: shop identity, the signed-in
//! customer, and pending flash messages.

use crate::middleware::Flashes;
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;
use crate::supabase::AuthSession;

/// Shared page chrome.
#[derive(Clone)]
pub struct Layout {
    pub store_name: String,
    pub contact_phone: Option<String>,
    pub instagram_handle: Option<String>,
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl Layout {
    /// Build the chrome for a page.
    #[must_use]
    pub fn new(state: &AppState, auth: Option<&AuthSession>, Flashes(flashes): Flashes) -> Self {
        let store = &state.config().store;
        Self {
            store_name: store.name.clone(),
            contact_phone: store.contact_phone.clone(),
            instagram_handle: store.instagram_handle.clone(),
            user: auth.map(CurrentUser::from),
            flashes,
        }
    }

    /// Show an error on this page without a redirect.
    pub fn error(&mut self, message: impl Into<String>) {
        self.flashes.push(Flash::error(message));
    }
}
