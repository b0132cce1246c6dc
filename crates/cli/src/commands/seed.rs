//! Seed the backend catalog from a YAML file.
//!
//! Categories are matched by slug. A category that already exists is left
//! alone together with its products, so re-running the seed is safe.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info, warn};

use choco_bliss_core::{CategoryId, ProductId};
use choco_bliss_storefront::config::SupabaseConfig;
use choco_bliss_storefront::supabase::{Category, NewProductVariant, SupabaseClient};

use super::catalog::{CatalogFile, validate};

/// Catalog reads are not used by this command.
const CACHE_TTL: Duration = Duration::from_secs(1);

/// Seed categories, products, and variants from a YAML file.
///
/// # Arguments
///
/// * `path` - Path to the YAML catalog file
/// * `dry_run` - If true, only validate and report what would be inserted
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, if
/// backend settings or the service key are missing, or if an insert fails.
pub async fn catalog(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    info!(path = %path.display(), "Loading catalog from file");

    // Read and validate YAML before talking to the backend
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    info!(
        categories = catalog.categories.len(),
        products = catalog.product_count(),
        variants = catalog.variant_count(),
        "Parsed catalog"
    );

    let errors = validate(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    info!("Catalog validated successfully");

    if dry_run {
        for category in &catalog.categories {
            info!(
                "  {} ({}): {} products",
                category.name,
                category.slug,
                category.products.len()
            );
        }
        info!("Dry run, nothing written");
        return Ok(());
    }

    let config = SupabaseConfig::from_env()?;
    if config.service_role_key.is_none() {
        return Err("SUPABASE_SERVICE_ROLE_KEY not set".into());
    }
    let client = SupabaseClient::new(&config, CACHE_TTL)?;

    let summary = seed_catalog(&client, &catalog).await?;

    info!("Seeding complete!");
    info!("  Categories inserted: {}", summary.categories);
    info!("  Categories skipped (already exist): {}", summary.skipped);
    info!("  Products inserted: {}", summary.products);
    info!("  Variants inserted: {}", summary.variants);

    Ok(())
}

/// Counts from one seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub skipped: usize,
    pub products: usize,
    pub variants: usize,
}

/// Insert a validated catalog.
///
/// Products are only written for categories inserted by this run.
///
/// # Errors
///
/// Returns an error if any backend insert fails.
pub async fn seed_catalog(
    client: &SupabaseClient,
    catalog: &CatalogFile,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let new_categories: Vec<_> = catalog.categories.iter().map(|c| c.to_new()).collect();
    let inserted = client.seed_categories(&new_categories).await?;
    let category_ids = ids_by_slug(&inserted);

    let mut summary = SeedSummary {
        categories: inserted.len(),
        skipped: catalog.categories.len().saturating_sub(inserted.len()),
        ..SeedSummary::default()
    };

    let mut new_products = Vec::new();
    for category in &catalog.categories {
        let Some(&category_id) = category_ids.get(category.slug.as_str()) else {
            warn!(slug = %category.slug, "Category already exists, skipping its products");
            continue;
        };
        new_products.extend(category.products.iter().map(|p| p.to_new(category_id)));
    }

    let products = client.seed_products(&new_products).await?;
    summary.products = products.len();

    let product_ids: HashMap<(CategoryId, &str), ProductId> = products
        .iter()
        .filter_map(|p| Some(((p.category_id?, p.name.as_str()), p.id)))
        .collect();

    let mut new_variants: Vec<NewProductVariant> = Vec::new();
    for category in &catalog.categories {
        let Some(&category_id) = category_ids.get(category.slug.as_str()) else {
            continue;
        };
        for product in &category.products {
            let key = (category_id, product.name.trim());
            let Some(&product_id) = product_ids.get(&key) else {
                warn!(product = %product.name, "Inserted product not returned, skipping variants");
                continue;
            };
            new_variants.extend(product.variants.iter().map(|v| v.to_new(product_id)));
        }
    }

    let variants = client.seed_variants(&new_variants).await?;
    summary.variants = variants.len();

    Ok(summary)
}

fn ids_by_slug(categories: &[Category]) -> HashMap<&str, CategoryId> {
    categories
        .iter()
        .map(|c| (c.slug.as_str(), c.id))
        .collect()
}
