//! edgemap-pipeline: Pure raster edge detection pipeline (sans-IO).
//!
//! Converts an image into a binary edge map through:
//! grayscale (max channel) -> 3x3 box blur -> Sobel gradient -> threshold.
//!
//! Every pixel of the output is either 0 or 255. By default edges are
//! black on a white background; [`FilterConfig::invert`] swaps that.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and images and returns owned rasters. Reading and
//! writing files lives in the `edgemap` binary and `edgemap-export`.

pub mod blur;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod pipeline;
pub mod raster;
pub mod types;

pub use pipeline::Pipeline;
pub use raster::RasterBuffer;
pub use types::{
    BorderMode, Dimensions, DynamicImage, FilterConfig, GrayImage, PipelineError, StagedResult,
};

/// Run grayscale, blur and Sobel on an already decoded image.
///
/// The input is only borrowed; a new edge map of the same dimensions
/// is returned.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration is
/// invalid, and [`PipelineError::InvalidDimensions`] if the image has a
/// zero width or height.
pub fn run_pipeline(
    image: &DynamicImage,
    config: &FilterConfig,
) -> Result<RasterBuffer, PipelineError> {
    config.validate()?;
    let intensity = grayscale::to_intensity(image)?;
    detect_edges(&intensity, config)
}

/// Run blur and Sobel on a raster that is already single-channel.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration is
/// invalid.
pub fn detect_edges(
    intensity: &RasterBuffer,
    config: &FilterConfig,
) -> Result<RasterBuffer, PipelineError> {
    config.validate()?;
    let blurred = blur::box_blur(intensity, config.border);
    Ok(edge::sobel(&blurred, config.threshold, config.invert, config.border))
}

/// Decode encoded image bytes (PNG, JPEG, BMP, WebP) and run the full
/// pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration is
/// invalid, [`PipelineError::EmptyInput`] if `image_bytes` is empty and
/// [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &FilterConfig,
) -> Result<RasterBuffer, PipelineError> {
    config.validate()?;
    let image = grayscale::decode(image_bytes)?;
    run_pipeline(&image, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStage;

    /// Create a minimal PNG with a sharp black/white boundary for testing.
    fn sharp_edge_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, _y| {
            if x < width / 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &FilterConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &FilterConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_rejects_invalid_config_before_decoding() {
        let config = FilterConfig {
            threshold: f64::INFINITY,
            ..FilterConfig::default()
        };
        let result = process(&[], &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_sharp_edge_marks_boundary() {
        let png = sharp_edge_png(40, 40);
        let edges = process(&png, &FilterConfig::default()).unwrap();
        assert_eq!(
            edges.dimensions(),
            Dimensions {
                width: 40,
                height: 40
            }
        );
        // The boundary sits between columns 19 and 20.
        assert_eq!(edges.get(19, 20), Some(0));
        assert_eq!(edges.get(20, 20), Some(0));
        // Far from the boundary and the border, the image is flat.
        assert_eq!(edges.get(5, 20), Some(255));
        assert_eq!(edges.get(34, 20), Some(255));
    }

    #[test]
    fn process_with_invert() {
        let png = sharp_edge_png(40, 40);
        let normal = process(&png, &FilterConfig::default()).unwrap();
        let inverted = process(
            &png,
            &FilterConfig {
                invert: true,
                ..FilterConfig::default()
            },
        )
        .unwrap();
        assert_eq!(edge::invert_edge_map(&normal), inverted);
    }

    #[test]
    fn process_matches_staged_pipeline() {
        let png = sharp_edge_png(24, 16);
        let config = FilterConfig::default();
        let edges = process(&png, &config).unwrap();
        let staged = Pipeline::new(png, config).decode().unwrap().complete();
        assert_eq!(edges, staged.unwrap().edges);
    }

    #[test]
    fn run_pipeline_borrows_input() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(5, 5, image::Luma([200])));
        let edges = run_pipeline(&img, &FilterConfig::default()).unwrap();
        assert_eq!(edges.dimensions(), Dimensions { width: 5, height: 5 });
        assert_eq!(img.as_luma8().unwrap().get_pixel(2, 2).0, [200]);
    }

    #[test]
    fn detect_edges_on_intensity_raster() {
        let intensity = RasterBuffer::from_fn(12, 12, |x, _| if x < 6 { 0 } else { 255 }).unwrap();
        let edges = detect_edges(&intensity, &FilterConfig::default()).unwrap();
        assert_eq!(edges.get(5, 6), Some(0));
        assert_eq!(edges.get(6, 6), Some(0));
        assert_eq!(edges.get(2, 6), Some(255));
    }

    #[test]
    fn detect_edges_rejects_negative_threshold() {
        let intensity = RasterBuffer::new(3, 3).unwrap();
        let config = FilterConfig {
            threshold: -0.5,
            ..FilterConfig::default()
        };
        assert!(matches!(
            detect_edges(&intensity, &config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
