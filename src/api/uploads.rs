//! Image uploads for slides and subjects.
//!
//! Files are written to `uploads.dir` as `<uuid>.<ext>` and served back
//! under `/uploads/`.

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ApiError;
use crate::config::UploadsConfig;

pub const PUBLIC_PREFIX: &str = "/uploads/";
pub const IMAGE_FIELD: &str = "image";

/// Extension for each accepted image content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// An accepted image still held in memory
#[derive(Debug)]
pub struct PendingImage {
    pub ext: &'static str,
    pub bytes: Bytes,
}

/// Text fields plus the optional `image` part of a multipart form
#[derive(Debug, Default)]
pub struct ImageForm {
    pub fields: HashMap<String, String>,
    pub image: Option<PendingImage>,
}

impl ImageForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::ValidationError(format!("{name} is required")))
    }

    pub fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.text(name)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| ApiError::ValidationError(format!("{name} is not valid")))
            })
            .transpose()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// Read a multipart form, checking the image type and size
pub async fn read_form(mut multipart: Multipart, cfg: &UploadsConfig) -> Result<ImageForm, ApiError> {
    let mut form = ImageForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == IMAGE_FIELD {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let ext = extension_for(&content_type).ok_or_else(|| {
                ApiError::BadRequest(format!("unsupported image type `{content_type}`"))
            })?;
            let bytes = field.bytes().await?;
            if bytes.is_empty() {
                return Err(ApiError::BadRequest("image is empty".into()));
            }
            if bytes.len() > cfg.max_bytes {
                return Err(ApiError::BadRequest(format!(
                    "image exceeds {} bytes",
                    cfg.max_bytes
                )));
            }
            form.image = Some(PendingImage { ext, bytes });
        } else {
            form.fields.insert(name, field.text().await?);
        }
    }
    Ok(form)
}

/// Write `image` to disk and return its public path
pub async fn store(dir: &Path, image: &PendingImage) -> Result<String, ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::InternalError(format!("creating {}: {e}", dir.display())))?;
    let file = format!("{}.{}", Uuid::new_v4(), image.ext);
    tokio::fs::write(dir.join(&file), &image.bytes)
        .await
        .map_err(|e| ApiError::InternalError(format!("writing {file}: {e}")))?;
    info!(file = %file, bytes = image.bytes.len(), "image stored");
    Ok(format!("{PUBLIC_PREFIX}{file}"))
}

/// Delete a previously stored image. Failures are logged, never returned.
pub async fn remove(dir: &Path, public_path: &str) {
    let Some(file) = public_path.strip_prefix(PUBLIC_PREFIX) else {
        return;
    };
    // Only plain file names produced by `store` are ever deleted
    if file.is_empty() || file.contains('/') || file.contains('\\') || file.contains("..") {
        warn!(path = %public_path, "refusing to delete unexpected upload path");
        return;
    }
    if let Err(e) = tokio::fs::remove_file(dir.join(file)).await {
        warn!(file = %file, error = %e, "could not delete upload");
    }
}
