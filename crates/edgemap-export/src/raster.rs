//! Single-channel raster encoding.
//!
//! Writes 8-bit grayscale data with the `image` crate's encoders. This
//! is a pure function with no I/O: it returns the encoded bytes and the
//! caller decides where they go.

use std::fmt;
use std::path::Path;

use edgemap_pipeline::{GrayImage, RasterBuffer};
use image::ImageEncoder;

/// Errors that can occur while encoding a raster.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The encoder rejected the image.
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The output path has no extension, or one we cannot encode.
    #[error("unsupported output format: {0:?} (expected .png or .bmp)")]
    UnknownFormat(String),
}

/// Lossless output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Portable Network Graphics.
    #[default]
    Png,
    /// Windows bitmap.
    Bmp,
}

impl ExportFormat {
    /// Pick a format from a path's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnknownFormat`] if the extension is
    /// missing or not `png`/`bmp`.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            _ => Err(ExportError::UnknownFormat(path.display().to_string())),
        }
    }

    /// Canonical file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode a raster in the given format.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode(raster: &RasterBuffer, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    encode_gray(raster.as_gray(), format)
}

/// Encode a `GrayImage` in the given format.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_gray(image: &GrayImage, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    let (width, height) = image.dimensions();
    let color = image::ExtendedColorType::L8;
    match format {
        ExportFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut bytes);
            encoder.write_image(image.as_raw(), width, height, color)?;
        }
        ExportFormat::Bmp => {
            let encoder = image::codecs::bmp::BmpEncoder::new(&mut bytes);
            encoder.write_image(image.as_raw(), width, height, color)?;
        }
    }
    Ok(bytes)
}
