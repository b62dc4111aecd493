//! Sobel gradient magnitude and binary edge thresholding.
//!
//! Two fixed 3x3 kernels approximate the horizontal and vertical
//! intensity gradients. Their magnitude `sqrt(gx^2 + gy^2)` is compared
//! against a threshold to produce a binary map where every pixel is
//! either 0 or 255.
//!
//! With [`BorderMode::Omit`] samples outside the raster contribute
//! nothing and the remaining kernel weights are used as-is, so border
//! pixels see a one-sided gradient. [`BorderMode::Replicate`] wraps
//! [`imageproc::gradients::horizontal_sobel`] and
//! [`imageproc::gradients::vertical_sobel`].

use crate::raster::RasterBuffer;
use crate::types::BorderMode;

/// Horizontal gradient kernel, row-major.
pub const KERNEL_X: [f64; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];

/// Vertical gradient kernel, row-major.
pub const KERNEL_Y: [f64; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// Output value for the darker side of the threshold decision.
pub const BLACK: u8 = 0;

/// Output value for the brighter side of the threshold decision.
pub const WHITE: u8 = 255;

/// Horizontal and vertical gradient at one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    /// Response to [`KERNEL_X`].
    pub gx: f64,
    /// Response to [`KERNEL_Y`].
    pub gy: f64,
}

impl Gradient {
    /// Euclidean magnitude of the gradient.
    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.gx.hypot(self.gy)
    }
}

/// Per-pixel gradient magnitudes, row-major.
///
/// Kept separate from the thresholded output so the threshold can be
/// changed without recomputing the convolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeMap {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl MagnitudeMap {
    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Magnitude at `(x, y)`, or `None` outside the map.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.values.get(index).copied()
    }

    /// Row-major magnitudes.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Largest magnitude in the map.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Gradient at `(x, y)` under the omit policy.
///
/// Out-of-range neighbors are skipped; the kernel weight for each
/// offset is fixed by its position and never renormalized.
#[must_use]
pub fn gradient_at(image: &RasterBuffer, x: u32, y: u32) -> Gradient {
    let mut gradient = Gradient { gx: 0.0, gy: 0.0 };
    for ((sample, kx), ky) in image
        .neighborhood(x, y)
        .into_iter()
        .zip(KERNEL_X)
        .zip(KERNEL_Y)
    {
        if let Some(v) = sample {
            let v = f64::from(v);
            gradient.gx += v * kx;
            gradient.gy += v * ky;
        }
    }
    gradient
}

/// Compute the gradient magnitude of every pixel.
#[must_use = "returns the magnitude map"]
pub fn magnitude_map(image: &RasterBuffer, border: BorderMode) -> MagnitudeMap {
    let (width, height) = (image.width(), image.height());
    let values = match border {
        BorderMode::Omit => (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| gradient_at(image, x, y).magnitude())
            .collect(),
        BorderMode::Replicate => {
            let gx = imageproc::gradients::horizontal_sobel(image.as_gray());
            let gy = imageproc::gradients::vertical_sobel(image.as_gray());
            gx.pixels()
                .zip(gy.pixels())
                .map(|(h, v)| {
                    Gradient {
                        gx: f64::from(h.0[0]),
                        gy: f64::from(v.0[0]),
                    }
                    .magnitude()
                })
                .collect()
        }
    };
    MagnitudeMap {
        width,
        height,
        values,
    }
}

/// Value written for pixels at or above the threshold.
#[must_use]
pub const fn edge_value(invert: bool) -> u8 {
    if invert { WHITE } else { BLACK }
}

/// Value written for pixels below the threshold.
#[must_use]
pub const fn background_value(invert: bool) -> u8 {
    if invert { BLACK } else { WHITE }
}

/// Threshold a magnitude map into a binary raster.
///
/// `magnitude < threshold` maps to [`background_value`], everything
/// else to [`edge_value`].
#[must_use = "returns the binary edge map"]
pub fn threshold_magnitudes(
    magnitudes: &MagnitudeMap,
    threshold: f64,
    invert: bool,
) -> RasterBuffer {
    let image = image::GrayImage::from_fn(magnitudes.width, magnitudes.height, |x, y| {
        let magnitude = magnitudes.get(x, y).unwrap_or(0.0);
        if magnitude < threshold {
            image::Luma([background_value(invert)])
        } else {
            image::Luma([edge_value(invert)])
        }
    });
    RasterBuffer::from_valid_gray(image)
}

/// Detect edges with the Sobel operator.
///
/// Reads only from `image`; every output pixel is 0 or 255. By default
/// edges are black on white, `invert` swaps the polarity.
#[must_use = "returns the binary edge map"]
pub fn sobel(
    image: &RasterBuffer,
    threshold: f64,
    invert: bool,
    border: BorderMode,
) -> RasterBuffer {
    threshold_magnitudes(&magnitude_map(image, border), threshold, invert)
}

/// Invert a binary edge map (bitwise NOT).
///
/// Swaps 0 and 255. Applying it to a thresholded map gives the same
/// result as thresholding with the opposite `invert` flag.
#[must_use = "returns the inverted edge map"]
pub fn invert_edge_map(edges: &RasterBuffer) -> RasterBuffer {
    edges.map_pixels(|x, y| !edges.get(x, y).unwrap_or(0))
}

/// Count pixels carrying the edge value for the given polarity.
#[must_use]
pub fn count_edge_pixels(edges: &RasterBuffer, invert: bool) -> u64 {
    let edge = edge_value(invert);
    edges
        .pixels()
        .iter()
        .map(|&p| u64::from(p == edge))
        .sum()
}
