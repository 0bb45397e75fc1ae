use std::path::Path;

use image::ImageFormat;
use uuid::Uuid;

use crate::{
    constants::{MSG_INVALID_IMAGE, RECIPE_IMAGE_DIR, RECIPE_IMAGE_FIELD},
    error::{ApiError, FieldErrors},
};

fn invalid_image() -> ApiError {
    ApiError::Validation(FieldErrors::single(RECIPE_IMAGE_FIELD, MSG_INVALID_IMAGE))
}

/// Decodes the payload and returns its format; anything undecodable is rejected.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, ApiError> {
    let format = image::guess_format(bytes).map_err(|_| invalid_image())?;
    image::load_from_memory_with_format(bytes, format).map_err(|_| invalid_image())?;

    Ok(format)
}

/// `upload/recipe/<uuid>.<ext>`, keeping the extension of the uploaded file
/// name or, when it has none, the detected format's extension.
pub fn recipe_image_path(filename: Option<&str>, format: ImageFormat) -> String {
    let extension = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
        .unwrap_or_else(|| {
            format
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("img")
                .to_string()
        });

    format!("{RECIPE_IMAGE_DIR}/{}.{extension}", Uuid::new_v4())
}

pub async fn save_file(media_root: &Path, relative: &str, bytes: &[u8]) -> Result<(), ApiError> {
    let path = media_root.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;

    Ok(())
}

pub fn media_url(base: &str, relative: &str) -> String {
    format!("{base}{relative}")
}
