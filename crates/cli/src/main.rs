//! Counterline CLI - Database migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cl-cli migrate
//!
//! # Load the embedded demo catalog into store 1
//! cl-cli seed demo --store 1
//!
//! # Load demo data from a YAML file
//! cl-cli seed demo --store 1 --file demo.yaml
//!
//! # Wipe demo data and transactions, go live
//! cl-cli promote --store 1 --yes
//!
//! # Reset a forgotten store PIN
//! cl-cli pin set --store 1 --pin 4821
//!
//! # Expire pending orders older than 48 hours
//! cl-cli orders expire --hours 48
//! ```
//!
//! # Environment Variables
//!
//! - `POS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use counterline_core::StoreId;

mod commands;

#[derive(Parser)]
#[command(name = "cl-cli")]
#[command(author, version, about = "Counterline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load demo data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Delete demo data and all transactions, then switch the store to production
    Promote {
        /// Store to promote
        #[arg(short, long, default_value = "1")]
        store: StoreId,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Manage the store PIN
    Pin {
        #[command(subcommand)]
        action: PinAction,
    },
    /// Pending order maintenance
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Seed the demo catalog, customers and ads
    Demo {
        /// Store to seed
        #[arg(short, long, default_value = "1")]
        store: StoreId,

        /// YAML file to load instead of the embedded data set
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PinAction {
    /// Replace the PIN without the current one
    Set {
        #[arg(short, long, default_value = "1")]
        store: StoreId,

        /// New PIN, 4 to 8 digits
        #[arg(short, long)]
        pin: String,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Expire stale pending orders across all stores
    Expire {
        /// Maximum age of a pending order
        #[arg(long, default_value_t = 48)]
        hours: i64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Demo { store, file } => {
                commands::demo::seed(store, file.as_deref()).await?;
            }
        },
        Commands::Promote { store, yes } => commands::demo::promote(store, yes).await?,
        Commands::Pin { action } => match action {
            PinAction::Set { store, pin } => commands::pin::set(store, &pin).await?,
        },
        Commands::Orders { action } => match action {
            OrderAction::Expire { hours } => commands::orders::expire(hours).await?,
        },
    }
    Ok(())
}
