//! Product image set rules.
//!
//! A product carries an ordered list of images and an index pointing at the
//! primary one. Uploads are validated as a batch before anything is stored.

use serde::{Deserialize, Serialize};

/// Accepted image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Map a declared content type (parameters ignored) onto a format.
    #[must_use]
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect the format from the file's magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(PNG) {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

/// Rejections for uploads and image-set edits.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageRuleError {
    #[error("no images were provided")]
    EmptyBatch,
    #[error("a product can have at most {max} images ({existing} already stored, {incoming} uploaded)")]
    TooManyImages {
        max: usize,
        existing: usize,
        incoming: usize,
    },
    #[error("{filename} is {size} bytes; the limit is {max} bytes")]
    FileTooLarge {
        filename: String,
        size: usize,
        max: usize,
    },
    #[error("{filename} has unsupported content type {content_type}")]
    UnsupportedType {
        filename: String,
        content_type: String,
    },
    #[error("{filename} content does not match its declared type {content_type}")]
    ContentMismatch {
        filename: String,
        content_type: String,
    },
    #[error("requested order must contain each current image exactly once")]
    NotAPermutation,
    #[error("primary index {index} is out of range for {len} images")]
    PrimaryOutOfRange { index: usize, len: usize },
}

/// Limits applied to a product's images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRules {
    pub max_images: usize,
    pub max_bytes: usize,
}

impl Default for ImageRules {
    fn default() -> Self {
        Self {
            max_images: 8,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// One file from an upload request.
#[derive(Debug, Clone, Copy)]
pub struct UploadCandidate<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

impl ImageRules {
    /// Validate a whole upload batch, returning the detected format per file.
    ///
    /// # Errors
    ///
    /// Returns the first rule the batch violates. Nothing should be stored
    /// when this fails.
    pub fn validate_upload_batch(
        &self,
        existing: usize,
        batch: &[UploadCandidate<'_>],
    ) -> Result<Vec<ImageFormat>, ImageRuleError> {
        if batch.is_empty() {
            return Err(ImageRuleError::EmptyBatch);
        }
        if existing + batch.len() > self.max_images {
            return Err(ImageRuleError::TooManyImages {
                max: self.max_images,
                existing,
                incoming: batch.len(),
            });
        }

        batch
            .iter()
            .map(|file| {
                if file.bytes.len() > self.max_bytes {
                    return Err(ImageRuleError::FileTooLarge {
                        filename: file.filename.to_string(),
                        size: file.bytes.len(),
                        max: self.max_bytes,
                    });
                }
                let declared = ImageFormat::from_mime(file.content_type).ok_or_else(|| {
                    ImageRuleError::UnsupportedType {
                        filename: file.filename.to_string(),
                        content_type: file.content_type.to_string(),
                    }
                })?;
                match ImageFormat::sniff(file.bytes) {
                    Some(actual) if actual == declared => Ok(declared),
                    _ => Err(ImageRuleError::ContentMismatch {
                        filename: file.filename.to_string(),
                        content_type: file.content_type.to_string(),
                    }),
                }
            })
            .collect()
    }
}

/// Check that `requested` is a permutation of `current` and return it.
///
/// # Errors
///
/// Returns [`ImageRuleError::NotAPermutation`] on missing, extra or repeated ids.
pub fn reorder<T: Ord + Copy>(current: &[T], requested: &[T]) -> Result<Vec<T>, ImageRuleError> {
    let mut a = current.to_vec();
    let mut b = requested.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    if a == b {
        Ok(requested.to_vec())
    } else {
        Err(ImageRuleError::NotAPermutation)
    }
}

/// Bounds-check a primary index for a set of `len` images.
///
/// An empty set accepts only index 0.
///
/// # Errors
///
/// Returns [`ImageRuleError::PrimaryOutOfRange`].
pub const fn validate_primary(len: usize, index: usize) -> Result<usize, ImageRuleError> {
    if index < len || (len == 0 && index == 0) {
        Ok(index)
    } else {
        Err(ImageRuleError::PrimaryOutOfRange { index, len })
    }
}

/// Primary index after removing the image at `removed`.
///
/// The same image stays primary when possible; removing the primary resets to 0.
#[must_use]
pub const fn primary_after_removal(primary: usize, removed: usize) -> usize {
    if removed == primary {
        0
    } else if removed < primary {
        primary - 1
    } else {
        primary
    }
}

/// Primary index after a reorder, following the image that was primary.
#[must_use]
pub fn primary_after_reorder<T: PartialEq>(
    old_order: &[T],
    old_primary: usize,
    new_order: &[T],
) -> usize {
    old_order
        .get(old_primary)
        .and_then(|id| new_order.iter().position(|x| x == id))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0";

    fn file<'a>(content_type: &'a str, bytes: &'a [u8]) -> UploadCandidate<'a> {
        UploadCandidate {
            filename: "photo",
            content_type,
            bytes,
        }
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageFormat::sniff(JPEG), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(PNG), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a"), None);
    }

    #[test]
    fn test_from_mime_ignores_parameters() {
        assert_eq!(
            ImageFormat::from_mime("Image/PNG; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime("image/gif"), None);
    }

    #[test]
    fn test_batch_count_limit() {
        let rules = ImageRules::default();
        let batch = [file("image/jpeg", JPEG), file("image/jpeg", JPEG)];
        assert!(rules.validate_upload_batch(6, &batch).is_ok());
        assert_eq!(
            rules.validate_upload_batch(7, &batch).unwrap_err(),
            ImageRuleError::TooManyImages {
                max: 8,
                existing: 7,
                incoming: 2
            }
        );
    }

    #[test]
    fn test_batch_size_limit() {
        let rules = ImageRules {
            max_images: 8,
            max_bytes: 4,
        };
        let err = rules
            .validate_upload_batch(0, &[file("image/jpeg", JPEG)])
            .unwrap_err();
        assert!(matches!(err, ImageRuleError::FileTooLarge { size: 6, .. }));
    }

    #[test]
    fn test_declared_type_must_match_content() {
        let rules = ImageRules::default();
        assert!(matches!(
            rules.validate_upload_batch(0, &[file("image/png", JPEG)]),
            Err(ImageRuleError::ContentMismatch { .. })
        ));
        assert!(matches!(
            rules.validate_upload_batch(0, &[file("image/gif", JPEG)]),
            Err(ImageRuleError::UnsupportedType { .. })
        ));
        assert_eq!(
            rules.validate_upload_batch(0, &[file("image/png", PNG)]).unwrap(),
            vec![ImageFormat::Png]
        );
    }

    #[test]
    fn test_reorder_requires_permutation() {
        assert_eq!(reorder(&[1, 2, 3], &[3, 1, 2]).unwrap(), vec![3, 1, 2]);
        assert_eq!(reorder(&[1, 2, 3], &[1, 2]), Err(ImageRuleError::NotAPermutation));
        assert_eq!(reorder(&[1, 2, 3], &[1, 1, 2]), Err(ImageRuleError::NotAPermutation));
        assert_eq!(reorder(&[1, 2], &[1, 2, 9]), Err(ImageRuleError::NotAPermutation));
    }

    #[test]
    fn test_primary_bounds() {
        assert_eq!(validate_primary(3, 2), Ok(2));
        assert_eq!(validate_primary(0, 0), Ok(0));
        assert_eq!(
            validate_primary(3, 3),
            Err(ImageRuleError::PrimaryOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_primary_follows_image_on_removal() {
        assert_eq!(primary_after_removal(2, 0), 1);
        assert_eq!(primary_after_removal(2, 2), 0);
        assert_eq!(primary_after_removal(1, 3), 1);
    }

    #[test]
    fn test_primary_follows_image_on_reorder() {
        assert_eq!(primary_after_reorder(&[10, 20, 30], 1, &[30, 10, 20]), 2);
        assert_eq!(primary_after_reorder(&[10], 4, &[10]), 0);
    }
}
