//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cl-cli migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/` and are embedded in the
//! server library.

use counterline_server::db;

use super::{CliError, connect};

/// Run all pending migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    db::migrate(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
