//! Product management, stock adjustments and image sets.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use counterline_core::{ProductId, ProductImageId};

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequirePin, StoreScope};
use crate::models::{
    ImageOrderUpdate, Product, ProductFilter, ProductImageSet, ProductInput, StockAdjustment,
};
use crate::services::ImageService;
use crate::services::images::UploadedFile;
use crate::state::AppState;

pub async fn index(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .list(store_id, &filter)
            .await?,
    ))
}

#[instrument(skip(state, input), fields(sku = %input.sku))]
pub async fn create(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    input.validate().map_err(AppError::Validation)?;
    let product = ProductRepository::new(state.pool())
        .create(store_id, &input)
        .await?;
    state.catalog().invalidate(store_id).await;
    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn show(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(
        ProductRepository::new(state.pool()).get(store_id, id).await?,
    ))
}

#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    input.validate().map_err(AppError::Validation)?;
    let product = ProductRepository::new(state.pool())
        .update(store_id, id, &input)
        .await?;
    state.catalog().invalidate(store_id).await;
    Ok(Json(product))
}

/// Delete a product and its stored images. PIN required.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RequirePin(store_id): RequirePin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ImageService::new(&state).delete_product(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply a relative stock change (delivery, shrinkage, count correction).
#[instrument(skip(state, adjustment), fields(delta = %adjustment.delta))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<ProductId>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<Product>> {
    adjustment.validate().map_err(AppError::Validation)?;
    let product = ProductRepository::new(state.pool())
        .adjust_stock(store_id, id, adjustment.delta)
        .await?;
    state.catalog().invalidate(store_id).await;
    info!(
        product_id = %id,
        stock = %product.stock,
        reason = ?adjustment.reason,
        "Stock adjusted"
    );
    Ok(Json(product))
}

// =============================================================================
// Images
// =============================================================================

pub async fn images(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductImageSet>> {
    Ok(Json(ImageService::new(&state).list(store_id, id).await?))
}

/// Multipart upload; every part carrying a filename is treated as an image.
#[instrument(skip(state, multipart))]
pub async fn upload_images(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<ProductId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProductImageSet>)> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read {filename}: {e}")))?;
        files.push(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let set = ImageService::new(&state).upload(store_id, id, files).await?;
    Ok((StatusCode::CREATED, Json(set)))
}

/// Replace the display order (full array) and primary index.
pub async fn reorder_images(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<ProductId>,
    Json(update): Json<ImageOrderUpdate>,
) -> Result<Json<ProductImageSet>> {
    Ok(Json(
        ImageService::new(&state).reorder(store_id, id, update).await?,
    ))
}

/// Remove one image. PIN required.
pub async fn delete_image(
    State(state): State<AppState>,
    RequirePin(store_id): RequirePin,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Json<ProductImageSet>> {
    Ok(Json(
        ImageService::new(&state)
            .remove(store_id, id, image_id)
            .await?,
    ))
}
