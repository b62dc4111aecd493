//! Shared types for the edgemap processing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::raster::RasterBuffer;

/// Re-export `GrayImage` so downstream crates can hand rasters to
/// encoders without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `DynamicImage` so collaborators can pass already-decoded
/// multi-channel images into [`crate::run_pipeline`].
pub use image::DynamicImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// How a 3x3 window treats samples that fall outside the raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    /// Out-of-bounds samples are dropped from the sum.
    ///
    /// The blur still divides by 9 and the Sobel kernels are not
    /// renormalized, so border pixels come out darker and pick up a
    /// gradient even on flat input. This is the reference behavior.
    #[default]
    Omit,

    /// Border pixels are repeated outward, so every window is full.
    Replicate,
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omit => write!(f, "omit"),
            Self::Replicate => write!(f, "replicate"),
        }
    }
}

/// Configuration for the edge detection pipeline.
///
/// Only the Sobel stage depends on this configuration; grayscale and
/// blur are fixed. Callers that sweep thresholds can therefore reuse
/// the blurred raster (see [`crate::pipeline::EdgesDetected::rethreshold`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Gradient magnitude cutoff. Pixels with magnitude strictly below
    /// this value are background, everything else is an edge.
    ///
    /// Must be finite and non-negative.
    pub threshold: f64,

    /// Swap the output polarity.
    ///
    /// By default edges are black (0) on a white (255) background; with
    /// `invert` edges are white on black.
    pub invert: bool,

    /// Border handling for both the blur and the Sobel stage.
    pub border: BorderMode,
}

impl FilterConfig {
    /// Default gradient magnitude threshold.
    pub const DEFAULT_THRESHOLD: f64 = 50.0;

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `threshold` is NaN,
    /// infinite, or negative.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.threshold.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold,
            )));
        }
        if self.threshold < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold must be non-negative, got {}",
                self.threshold,
            )));
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            invert: false,
            border: BorderMode::default(),
        }
    }
}

/// Every intermediate raster of a pipeline run.
///
/// Produced by [`crate::pipeline::EdgesDetected::into_result`]. The CLI
/// uses the intermediates to dump per-stage images.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedResult {
    /// Stage 2: single-channel intensity raster.
    pub grayscale: RasterBuffer,
    /// Stage 3: 3x3 box blur of the intensity raster.
    pub blurred: RasterBuffer,
    /// Stage 4: binary edge map (every pixel 0 or 255).
    pub edges: RasterBuffer,
    /// Dimensions shared by all three rasters.
    pub dimensions: Dimensions,
    /// Configuration that produced `edges`.
    pub config: FilterConfig,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The image could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input byte slice was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A raster was requested with a zero width or height.
    #[error("invalid raster dimensions {width}x{height}: both must be non-zero")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A raw pixel vector did not match `width * height`.
    #[error("expected {expected} pixels, got {actual}")]
    PixelCount {
        /// `width * height`.
        expected: u64,
        /// Length of the supplied vector.
        actual: usize,
    },

    /// A write targeted a coordinate outside the raster.
    #[error("pixel ({x}, {y}) is outside the {width}x{height} raster")]
    OutOfBounds {
        /// Requested column.
        x: u32,
        /// Requested row.
        y: u32,
        /// Raster width.
        width: u32,
        /// Raster height.
        height: u32,
    },

    /// The filter configuration violates an invariant.
    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),
}
