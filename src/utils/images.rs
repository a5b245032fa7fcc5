use crate::error::{Error, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Source extensions the converter is willing to open
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(ext))
}

/// Formats every whitelisted source can be re-encoded into
const TARGET_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Resolve a target extension (with or without the leading dot) to an encodable format
pub fn target_format(ext: &str) -> Result<(String, ImageFormat)> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() {
        return Err(Error::InvalidInput("target extension is empty".into()));
    }

    let format = ImageFormat::from_extension(&ext)
        .filter(|format| TARGET_FORMATS.contains(format) && format.writing_enabled())
        .ok_or_else(|| {
            Error::InvalidInput(format!("'.{}' is not a format that can be written", ext))
        })?;

    Ok((ext, format))
}

/// Bring the pixels into a layout the target encoder accepts
fn encodable(img: DynamicImage, format: ImageFormat) -> DynamicImage {
    match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.into_rgb8()),
        ImageFormat::Png | ImageFormat::Tiff => img,
        _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.into_rgba8()),
        _ => DynamicImage::ImageRgb8(img.into_rgb8()),
    }
}

/// Check that a written image decodes and has non-zero dimensions
pub fn validate_image(image_path: &Path) -> Result<()> {
    let img = image::open(image_path).map_err(|source| Error::Image {
        path: image_path.to_path_buf(),
        source,
    })?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::Malformed {
            what: image_path.display().to_string(),
            reason: "image has invalid dimensions (0x0)".into(),
        });
    }

    Ok(())
}

/// Re-encode `source_path` as `format` at `target_path`
pub fn convert_image(source_path: &Path, target_path: &Path, format: ImageFormat) -> Result<()> {
    let img = image::open(source_path).map_err(|source| Error::Image {
        path: source_path.to_path_buf(),
        source,
    })?;

    let written = encodable(img, format)
        .save_with_format(target_path, format)
        .map_err(|source| Error::Image {
            path: target_path.to_path_buf(),
            source,
        })
        .and_then(|()| validate_image(target_path));

    if written.is_err() {
        discard(target_path);
    }
    written
}

/// Remove a partially written output
fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                action = "cleanup",
                component = "images",
                path = ?path,
                error = %e,
                "Could not remove partial output"
            );
        }
    }
}
