//! D's Choco Bliss CLI - catalog seeding and order maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Load categories, products, and variants from a YAML file
//! choco-cli seed catalog crates/cli/data/catalog.yaml
//!
//! # Check the file without writing anything
//! choco-cli seed catalog crates/cli/data/catalog.yaml --dry-run
//!
//! # Settle orders whose payment callback never arrived
//! choco-cli orders reconcile --stale-after-minutes 30
//! ```
//!
//! Both write commands need `SUPABASE_SERVICE_ROLE_KEY`; `orders reconcile`
//! also needs the gateway credentials.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "choco-cli")]
#[command(author, version, about = "D's Choco Bliss CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the backend with catalog data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Maintain orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert categories, products, and variants from a YAML file
    Catalog {
        /// Path to the catalog file
        file: PathBuf,

        /// Validate the file and print what would be inserted
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Settle pending orders against the payment gateway
    Reconcile {
        /// Mark pending orders with no payment as failed after this many minutes
        #[arg(long, default_value_t = 30)]
        stale_after_minutes: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file, dry_run } => {
                commands::seed::catalog(&file, dry_run).await?;
            }
        },
        Commands::Orders { action } => match action {
            OrdersAction::Reconcile {
                stale_after_minutes,
            } => {
                commands::orders::reconcile(stale_after_minutes).await?;
            }
        },
    }
    Ok(())
}
