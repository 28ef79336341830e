//! Pending order maintenance.

use counterline_server::services::OrderService;

use super::{CliError, connect};

/// Expire pending orders older than `hours`, across all stores.
pub async fn expire(hours: i64) -> Result<(), CliError> {
    let pool = connect().await?;
    let expired = OrderService::new(&pool)
        .expire_stale(chrono::Duration::hours(hours))
        .await?;

    tracing::info!(expired, hours, "Expired stale pending orders");
    Ok(())
}
