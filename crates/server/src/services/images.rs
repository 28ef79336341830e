//! Product image sets: upload, reorder, primary selection, removal.
//!
//! Files are validated as a batch before anything is stored. Originals and
//! JPEG thumbnails go to the object store first; rows are written afterwards
//! in one transaction. If that transaction fails the stored objects are
//! deleted again.

use std::io::Cursor;

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use counterline_core::images::{
    ImageFormat, ImageRuleError, UploadCandidate, primary_after_removal, primary_after_reorder,
    reorder, validate_primary,
};
use counterline_core::{ProductId, ProductImageId, StoreId};

use crate::db::images::StoredImage;
use crate::db::{ImageRepository, ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::models::{ImageOrderUpdate, Product, ProductImageSet};
use crate::state::AppState;

/// One file taken from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Decode an image and encode a JPEG thumbnail that fits in `max_px` square.
///
/// Images already inside the box keep their size.
///
/// # Errors
///
/// Returns an error if the bytes cannot be decoded.
pub fn make_thumbnail(bytes: &[u8], max_px: u32) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let thumb = if decoded.width() > max_px || decoded.height() > max_px {
        decoded.thumbnail(max_px, max_px).to_rgb8()
    } else {
        decoded.to_rgb8()
    };
    let mut out = Cursor::new(Vec::new());
    thumb.write_to(&mut out, image::ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

fn object_key(product_id: ProductId, name: Uuid, format: ImageFormat) -> String {
    format!("products/{product_id}/{name}.{}", format.extension())
}

fn thumbnail_key(product_id: ProductId, name: Uuid) -> String {
    format!("products/{product_id}/{name}_thumb.jpg")
}

/// Image service.
pub struct ImageService<'a> {
    state: &'a AppState,
}

impl<'a> ImageService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn pool(&self) -> &'a PgPool {
        self.state.pool()
    }

    /// A product's images and primary index.
    ///
    /// # Errors
    ///
    /// Returns not found if the product is not in the store.
    pub async fn list(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<ProductImageSet, AppError> {
        let product = ProductRepository::new(self.pool()).get(store_id, product_id).await?;
        let images = ImageRepository::new(self.pool()).list(product_id).await?;
        Ok(ProductImageSet {
            product_id,
            primary_index: product.primary_image_index,
            images,
        })
    }

    /// Validate, thumbnail and store a batch of images, appending them to the set.
    ///
    /// # Errors
    ///
    /// Returns the first image rule the batch violates, a validation error
    /// for undecodable files, or an object-store error. Nothing is kept on error.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        files: Vec<UploadedFile>,
    ) -> Result<ProductImageSet, AppError> {
        let images = &self.state.config().images;
        let rules = images.rules();
        let existing = self.list(store_id, product_id).await?.images.len();

        let candidates: Vec<UploadCandidate<'_>> = files
            .iter()
            .map(|f| UploadCandidate {
                filename: &f.filename,
                content_type: &f.content_type,
                bytes: &f.bytes,
            })
            .collect();
        let formats = rules.validate_upload_batch(existing, &candidates)?;

        let mut stored: Vec<StoredImage> = Vec::with_capacity(files.len());
        let mut written: Vec<String> = Vec::new();
        for (file, format) in files.into_iter().zip(formats) {
            match self
                .store_one(product_id, file, format, images.thumbnail_px, &mut written)
                .await
            {
                Ok(image) => stored.push(image),
                Err(e) => {
                    self.state.image_store().delete_all(&written).await;
                    return Err(e);
                }
            }
        }

        match self.record(store_id, product_id, &stored, rules.max_images).await {
            Ok(set) => {
                self.state.catalog().invalidate(store_id).await;
                info!(product_id = %product_id, added = stored.len(), "Product images uploaded");
                Ok(set)
            }
            Err(e) => {
                self.state.image_store().delete_all(&written).await;
                Err(e)
            }
        }
    }

    async fn store_one(
        &self,
        product_id: ProductId,
        file: UploadedFile,
        format: ImageFormat,
        thumbnail_px: u32,
        written: &mut Vec<String>,
    ) -> Result<StoredImage, AppError> {
        let store = self.state.image_store();
        let filename = file.filename;
        let bytes = file.bytes;
        let byte_size = bytes.len();

        let (bytes, thumbnail) = tokio::task::spawn_blocking(move || {
            let thumb = make_thumbnail(&bytes, thumbnail_px);
            (bytes, thumb)
        })
        .await
        .map_err(|e| AppError::Internal(format!("thumbnail task failed: {e}")))?;
        let thumbnail = thumbnail
            .map_err(|e| AppError::Validation(format!("{filename} could not be decoded: {e}")))?;

        let name = Uuid::new_v4();
        let key = object_key(product_id, name, format);
        let thumb_key = thumbnail_key(product_id, name);

        store.put(&key, format.mime(), bytes).await?;
        written.push(key.clone());
        store.put(&thumb_key, ImageFormat::Jpeg.mime(), thumbnail).await?;
        written.push(thumb_key.clone());

        Ok(StoredImage {
            url: store.public_url(&key)?,
            thumbnail_url: store.public_url(&thumb_key)?,
            object_key: key,
            thumbnail_key: thumb_key,
            content_type: format.mime().to_string(),
            byte_size,
        })
    }

    async fn record(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        stored: &[StoredImage],
        max_images: usize,
    ) -> Result<ProductImageSet, AppError> {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;
        let product = lock_product(&mut tx, store_id, product_id).await?;
        let current = ImageRepository::list_in(&mut tx, product_id).await?;
        // Another upload may have landed since validation
        if current.len() + stored.len() > max_images {
            return Err(ImageRuleError::TooManyImages {
                max: max_images,
                existing: current.len(),
                incoming: stored.len(),
            }
            .into());
        }
        ImageRepository::append(&mut tx, product_id, current.len(), stored).await?;
        let images = ImageRepository::list_in(&mut tx, product_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(ProductImageSet {
            product_id,
            primary_index: product.primary_image_index,
            images,
        })
    }

    /// Replace the display order and optionally pick a new primary image.
    ///
    /// # Errors
    ///
    /// Returns `NotAPermutation` if the ids are not exactly the current set,
    /// or `PrimaryOutOfRange` for a bad primary index.
    #[instrument(skip(self, update))]
    pub async fn reorder(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        update: ImageOrderUpdate,
    ) -> Result<ProductImageSet, AppError> {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;
        let product = lock_product(&mut tx, store_id, product_id).await?;
        let current = ImageRepository::list_in(&mut tx, product_id).await?;
        let current_ids: Vec<ProductImageId> = current.iter().map(|i| i.id).collect();

        let ordered = reorder(&current_ids, &update.image_ids)?;
        let primary_index = match update.primary_index {
            Some(index) => validate_primary(ordered.len(), index)?,
            None => primary_after_reorder(&current_ids, product.primary_image_index, &ordered),
        };

        ImageRepository::set_positions(&mut tx, product_id, &ordered).await?;
        ProductRepository::set_primary_image(&mut tx, product_id, primary_index).await?;
        let images = ImageRepository::list_in(&mut tx, product_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        self.state.catalog().invalidate(store_id).await;
        info!(product_id = %product_id, primary_index, "Product images reordered");
        Ok(ProductImageSet {
            product_id,
            primary_index,
            images,
        })
    }

    /// Remove one image, closing the gap in positions.
    ///
    /// # Errors
    ///
    /// Returns not found if the image does not belong to the product.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        image_id: ProductImageId,
    ) -> Result<ProductImageSet, AppError> {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;
        let product = lock_product(&mut tx, store_id, product_id).await?;
        let current = ImageRepository::list_in(&mut tx, product_id).await?;
        let removed_at = current
            .iter()
            .position(|i| i.id == image_id)
            .ok_or_else(|| AppError::NotFound(format!("image {image_id}")))?;

        let removed = ImageRepository::delete(&mut tx, product_id, image_id).await?;
        let remaining: Vec<ProductImageId> = current
            .iter()
            .map(|i| i.id)
            .filter(|id| *id != image_id)
            .collect();
        ImageRepository::set_positions(&mut tx, product_id, &remaining).await?;
        let primary_index = primary_after_removal(product.primary_image_index, removed_at);
        ProductRepository::set_primary_image(&mut tx, product_id, primary_index).await?;
        let images = ImageRepository::list_in(&mut tx, product_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        self.state
            .image_store()
            .delete_all(&[removed.object_key, removed.thumbnail_key])
            .await;
        self.state.catalog().invalidate(store_id).await;
        info!(product_id = %product_id, image_id = %image_id, "Product image removed");
        Ok(ProductImageSet {
            product_id,
            primary_index,
            images,
        })
    }

    /// Delete a product together with its stored image objects.
    ///
    /// # Errors
    ///
    /// Returns not found, or a conflict if sales still reference it.
    #[instrument(skip(self))]
    pub async fn delete_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<(), AppError> {
        let products = ProductRepository::new(self.pool());
        products.get(store_id, product_id).await?;
        let keys = ImageRepository::new(self.pool()).object_keys(product_id).await?;
        products.delete(store_id, product_id).await?;

        self.state.image_store().delete_all(&keys).await;
        self.state.catalog().invalidate(store_id).await;
        info!(product_id = %product_id, objects = keys.len(), "Product deleted");
        Ok(())
    }
}

async fn lock_product(
    conn: &mut PgConnection,
    store_id: StoreId,
    product_id: ProductId,
) -> Result<Product, AppError> {
    ProductRepository::lock(conn, store_id, &[product_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{ImageBuffer, Rgb, RgbImage};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_thumbnail_is_jpeg_within_bounds() {
        let thumb = make_thumbnail(&png(800, 400), 320).unwrap();
        assert_eq!(&thumb[..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 160);
    }

    #[test]
    fn test_small_image_not_upscaled() {
        let thumb = make_thumbnail(&png(40, 30), 320).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert!(decoded.width() <= 40);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(make_thumbnail(b"not an image", 320).is_err());
    }

    #[test]
    fn test_keys() {
        let name = Uuid::nil();
        let key = object_key(ProductId::new(7), name, ImageFormat::Webp);
        assert_eq!(key, format!("products/7/{name}.webp"));
        assert!(thumbnail_key(ProductId::new(7), name).ends_with("_thumb.jpg"));
    }
}
