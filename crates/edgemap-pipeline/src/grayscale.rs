//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! single-channel [`RasterBuffer`] for the rest of the pipeline.
//!
//! Intensity is the HSV *value* of each pixel, i.e. the largest of its
//! color channels, not a weighted luma. A pure red, green or blue pixel
//! therefore has the same intensity as white.

use image::DynamicImage;

use crate::raster::RasterBuffer;
use crate::types::PipelineError;

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Convert a decoded image of any channel layout to an intensity raster.
///
/// Channels deeper than 8 bits are scaled down to 8 bits first. Alpha
/// is ignored.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if the image has zero
/// width or height.
pub fn to_intensity(image: &DynamicImage) -> Result<RasterBuffer, PipelineError> {
    let rgb = image.to_rgb8();
    RasterBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        r.max(g).max(b)
    })
}

/// Decode raw image bytes and convert them to an intensity raster.
///
/// # Errors
///
/// See [`decode`] and [`to_intensity`].
pub fn decode_to_intensity(bytes: &[u8]) -> Result<RasterBuffer, PipelineError> {
    to_intensity(&decode(bytes)?)
}
