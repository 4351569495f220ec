//! Recipe images on local disk, below the configured media dir.

use image::ImageFormat;
use std::future::Future;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::web::error::AppError;

/// URL prefix the media dir is served under.
pub const MEDIA_URL: &str = "/media/";

const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

/// Checks that `bytes` decode as a supported image and returns the detected format.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, AppError> {
    if bytes.is_empty() {
        return Err(AppError::InvalidInput("The submitted file is empty.".to_string()));
    }
    let invalid = || {
        AppError::InvalidInput(
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                .to_string(),
        )
    };
    let format = image::guess_format(bytes).map_err(|_| invalid())?;
    image::load_from_memory_with_format(bytes, format).map_err(|_| invalid())?;
    Ok(format)
}

/// Validates and writes an upload, returning its path relative to `media_dir`.
pub async fn save_recipe_image(media_dir: &Path, bytes: &[u8]) -> Result<String, AppError> {
    let format = validate_image(bytes)?;
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let relative_path = format!("{RECIPE_UPLOAD_DIR}/{}.{extension}", Uuid::new_v4());

    let target = media_dir.join(&relative_path);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, bytes).await?;
    info!(path = %relative_path, size = bytes.len(), "Stored recipe image.");
    Ok(relative_path)
}

/// Removes a stored image. Failures are logged, not returned; the row is already gone or replaced.
pub async fn remove_image(media_dir: &Path, relative_path: &str) {
    if relative_path.split('/').any(|segment| segment == "..") {
        warn!(path = %relative_path, "Refusing to remove image outside the media dir.");
        return;
    }
    if let Err(e) = tokio::fs::remove_file(media_dir.join(relative_path)).await {
        warn!(path = %relative_path, error = %e, "Failed to remove recipe image.");
    }
}

/// Awaits `persist`, which records a freshly stored image. When it fails the file
/// is removed again so no upload is left without a row pointing at it.
pub async fn keep_if_persisted<T, E>(
    media_dir: &Path,
    stored: &str,
    persist: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let result = persist.await;
    if result.is_err() {
        remove_image(media_dir, stored).await;
    }
    result
}

pub fn public_url(relative_path: &str) -> String {
    format!("{MEDIA_URL}{relative_path}")
}
