//! CLI command implementations.

pub mod demo;
pub mod migrate;
pub mod orders;
pub mod pin;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

use counterline_server::db::RepositoryError;
use counterline_server::error::AppError;
use counterline_server::services::pin::PinError;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Service(#[from] AppError),

    #[error("{0}")]
    Pin(#[from] PinError),

    #[error("Cannot read {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid demo data: {0}")]
    DemoData(String),

    #[error("Refusing to continue without --yes")]
    NotConfirmed,
}

/// Connect to the point-of-sale database.
///
/// Reads `POS_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("POS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("POS_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}
