//! Content-addressed file storage for payment-proof images.
//!
//! The lifecycle only ever sees the opaque reference returned by `store`.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{AppError, Result};

/// Largest accepted proof image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Detect the format from magic bytes; the client's claimed type is ignored.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validate and store an image, returning its reference (`<sha256>.<ext>`).
    /// Storing the same bytes twice yields the same reference.
    pub async fn store(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Payment proof image is empty".into()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation(format!(
                "Payment proof image exceeds {} MiB",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }
        let kind = ImageKind::sniff(bytes).ok_or_else(|| {
            AppError::Validation("Payment proof must be a JPEG, PNG or WebP image".into())
        })?;

        let digest = hex::encode(Sha256::digest(bytes));
        let reference = format!("{}.{}", digest, kind.extension());

        fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&reference);
        if fs::try_exists(&path).await? {
            return Ok(reference);
        }

        // Write then rename so a crash never leaves a truncated file under the final name
        let tmp = self.root.join(format!("{}.tmp-{}", reference, uuid::Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(reference = %reference, size = bytes.len(), "Stored payment proof image");
        Ok(reference)
    }

    /// Read back a stored image with its detected kind.
    pub async fn retrieve(&self, reference: &str) -> Result<(Vec<u8>, ImageKind)> {
        let kind = parse_reference(reference)
            .ok_or_else(|| AppError::NotFound("Image not found".into()))?;
        match fs::read(self.root.join(reference)).await {
            Ok(bytes) => Ok((bytes, kind)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("Image not found".into()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Accept only references this store could have produced, which also rules
/// out path traversal.
fn parse_reference(reference: &str) -> Option<ImageKind> {
    let (digest, ext) = reference.split_once('.')?;
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return None;
    }
    ImageKind::from_extension(ext)
}
