//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::{instrument, warn};

use crate::filters;
use crate::middleware::{Flashes, OptionalAuth};
use crate::routes::layout::Layout;
use crate::state::AppState;
use crate::supabase::Category;

/// Category card on the home page.
#[derive(Clone)]
pub struct CategoryCardView {
    pub name: String,
    pub slug: String,
    pub description: String,
}

impl From<&Category> for CategoryCardView {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone().unwrap_or_default(),
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub categories: Vec<CategoryCardView>,
}

/// Display the home page.
///
/// A backend outage only hides the category cards.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    flashes: Flashes,
) -> impl IntoResponse {
    let layout = Layout::new(&state, auth.as_ref(), flashes);

    let categories = match state.supabase().list_categories().await {
        Ok(categories) => categories.iter().map(CategoryCardView::from).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load categories for home page");
            Vec::new()
        }
    };

    HomeTemplate { layout, categories }
}
