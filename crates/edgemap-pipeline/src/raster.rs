//! Owned single-channel intensity raster.
//!
//! [`RasterBuffer`] is the substrate every stage traverses. It wraps an
//! `image::GrayImage` (row-major `u8` storage) and adds the guarantees
//! the algorithms rely on: non-zero dimensions and neighborhood reads
//! that report out-of-range samples as absent instead of padding them.

use image::GrayImage;

use crate::types::{Dimensions, PipelineError};

/// Offsets of a 3x3 window in kernel order (row by row, left to right).
pub const NEIGHBOR_OFFSETS: [(i32, i32); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// An owned 2D grid of 8-bit intensities.
///
/// Width and height are always non-zero. Stages never mutate a buffer
/// after returning it; each stage allocates its own output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    image: GrayImage,
}

impl RasterBuffer {
    /// Allocate a zero-filled raster.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if `width` or
    /// `height` is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        check_dimensions(width, height)?;
        Ok(Self {
            image: GrayImage::new(width, height),
        })
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if `width` or
    /// `height` is zero.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> u8,
    ) -> Result<Self, PipelineError> {
        check_dimensions(width, height)?;
        Ok(Self {
            image: GrayImage::from_fn(width, height, |x, y| image::Luma([f(x, y)])),
        })
    }

    /// Wrap an existing grayscale image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if the image is empty.
    pub fn from_gray(image: GrayImage) -> Result<Self, PipelineError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    /// Wrap an image produced from an existing raster of the same size.
    ///
    /// Only used by stages whose output dimensions are copied from a
    /// `RasterBuffer`, so the non-zero invariant already holds.
    pub(crate) fn from_valid_gray(image: GrayImage) -> Self {
        debug_assert!(image.width() > 0 && image.height() > 0);
        Self { image }
    }

    /// Wrap a row-major pixel vector.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if `width` or
    /// `height` is zero, and [`PipelineError::PixelCount`] if
    /// `pixels.len() != width * height`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, PipelineError> {
        check_dimensions(width, height)?;
        let expected = u64::from(width) * u64::from(height);
        let actual = pixels.len();
        GrayImage::from_raw(width, height, pixels)
            .map(|image| Self { image })
            .ok_or(PipelineError::PixelCount { expected, actual })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Width and height together.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Intensity at `(x, y)`, or `None` if the coordinate is outside
    /// the raster.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    /// Intensity at `(x + dx, y + dy)`, or `None` if that lands outside
    /// the raster (including negative coordinates).
    #[must_use]
    pub fn get_offset(&self, x: u32, y: u32, dx: i32, dy: i32) -> Option<u8> {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        self.get(nx, ny)
    }

    /// The 3x3 window centered on `(x, y)` in [`NEIGHBOR_OFFSETS`] order.
    ///
    /// Samples outside the raster are `None`.
    #[must_use]
    pub fn neighborhood(&self, x: u32, y: u32) -> [Option<u8>; 9] {
        NEIGHBOR_OFFSETS.map(|(dx, dy)| self.get_offset(x, y, dx, dy))
    }

    /// Overwrite the intensity at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OutOfBounds`] if the coordinate is
    /// outside the raster.
    pub fn set(&mut self, x: u32, y: u32, value: u8) -> Result<(), PipelineError> {
        let (width, height) = self.image.dimensions();
        let pixel = self
            .image
            .get_pixel_mut_checked(x, y)
            .ok_or(PipelineError::OutOfBounds {
                x,
                y,
                width,
                height,
            })?;
        pixel.0[0] = value;
        Ok(())
    }

    /// Build a new raster of the same size by evaluating `f(x, y)` for
    /// every pixel.
    ///
    /// `self` is only borrowed, so `f` may read from it freely without
    /// seeing any of the values being written.
    #[must_use = "returns a new raster"]
    pub fn map_pixels(&self, f: impl Fn(u32, u32) -> u8) -> Self {
        Self {
            image: GrayImage::from_fn(self.width(), self.height(), |x, y| {
                image::Luma([f(x, y)])
            }),
        }
    }

    /// Row-major pixel slice.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Borrow the underlying grayscale image.
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    /// Unwrap into the underlying grayscale image.
    #[must_use]
    pub fn into_gray(self) -> GrayImage {
        self.image
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidDimensions { width, height });
    }
    Ok(())
}
