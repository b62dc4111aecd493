//! 3x3 box blur for noise reduction before edge detection.
//!
//! With [`BorderMode::Omit`] every output pixel is the integer sum of the
//! in-bounds samples of its 3x3 window divided by 9, truncating. The
//! divisor does not shrink at the border, so edge pixels keep 6/9 and
//! corner pixels 4/9 of their brightness on flat input.
//!
//! [`BorderMode::Replicate`] wraps [`imageproc::filter::box_filter`],
//! which repeats the border pixels outward and keeps flat regions flat.

use crate::raster::RasterBuffer;
use crate::types::BorderMode;

/// Number of samples in a full 3x3 window, and the fixed divisor.
pub const WINDOW_SIZE: u32 = 9;

/// Apply a 3x3 mean filter.
///
/// Reads exclusively from `image` and returns a new raster of the same
/// size, so already-blurred values never feed later pixels.
#[must_use = "returns the blurred raster"]
pub fn box_blur(image: &RasterBuffer, border: BorderMode) -> RasterBuffer {
    match border {
        BorderMode::Omit => image.map_pixels(|x, y| window_mean(image, x, y)),
        BorderMode::Replicate => {
            RasterBuffer::from_valid_gray(imageproc::filter::box_filter(image.as_gray(), 1, 1))
        }
    }
}

/// Mean of the 3x3 window at `(x, y)` under the omit policy.
#[must_use]
pub fn window_mean(image: &RasterBuffer, x: u32, y: u32) -> u8 {
    let sum: u32 = image
        .neighborhood(x, y)
        .iter()
        .flatten()
        .map(|&v| u32::from(v))
        .sum();
    // At most 9 * 255 / 9, so the quotient always fits.
    u8::try_from(sum / WINDOW_SIZE).unwrap_or(u8::MAX)
}
