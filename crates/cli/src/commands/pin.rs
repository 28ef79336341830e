//! Store PIN recovery.

use counterline_core::StoreId;
use counterline_server::services::pin::reset_pin;

use super::{CliError, connect};

/// Replace the store PIN without the current one.
pub async fn set(store_id: StoreId, pin: &str) -> Result<(), CliError> {
    let pool = connect().await?;
    reset_pin(&pool, store_id, pin.trim()).await?;

    tracing::info!(store_id = %store_id, "Store PIN reset");
    Ok(())
}
