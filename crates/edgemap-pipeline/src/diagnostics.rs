//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! [`process_staged_with_diagnostics`] drives the [`Stage`] loop and
//! records how long each transition took along with the metrics the
//! stage reports. The core stays free of platform time: callers supply
//! a [`Clock`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::pipeline::{Advance, Pipeline, STAGE_COUNT, Stage};
use crate::raster::RasterBuffer;
use crate::types::{BorderMode, FilterConfig, PipelineError, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for measuring stage durations.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// One entry per executed stage, in pipeline order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name (see [`crate::pipeline::PipelineStage::NAME`]).
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes (0 when the image was supplied
        /// already decoded).
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
        /// Channel layout of the decoded image, e.g. `Rgba8`.
        color_type: String,
    },
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Mean intensity of the raster.
        mean_intensity: f64,
    },
    /// Box blur metrics.
    Blur {
        /// Border policy used.
        border: BorderMode,
        /// Mean intensity after blurring.
        mean_intensity: f64,
    },
    /// Sobel edge detection metrics.
    EdgeDetection {
        /// Gradient magnitude threshold.
        threshold: f64,
        /// Whether the output polarity was inverted.
        invert: bool,
        /// Border policy used.
        border: BorderMode,
        /// Number of pixels marked as edges.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
        /// Largest gradient magnitude in the image.
        max_magnitude: f64,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pixels marked as edges in the final map.
    pub edge_pixel_count: u64,
}

impl PipelineDiagnostics {
    /// Look up a stage's diagnostics by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Fraction of pixels marked as edges, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn edge_density(&self) -> f64 {
        if self.summary.pixel_count == 0 {
            return 0.0;
        }
        self.summary.edge_pixel_count as f64 / self.summary.pixel_count as f64
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{:<16} {ms:>8.3}ms {pct:>9.1}%  {details}", stage.name));
        }

        lines.push(String::new());
        lines.push(format!(
            "Edge pixels: {} ({:.1}%)",
            self.summary.edge_pixel_count,
            self.edge_density() * 100.0,
        ));

        lines.join("\n")
    }
}

/// Run the full pipeline, timing every stage.
///
/// # Errors
///
/// Returns [`PipelineError`] if decoding, config validation, or
/// grayscale conversion fails.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &FilterConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let mut stage: Stage = Pipeline::new(image_bytes.to_vec(), config.clone()).into();
    let mut stages = Vec::with_capacity(STAGE_COUNT - 1);

    loop {
        let start = clock.now();
        match stage.advance()? {
            Advance::Next(next) => {
                let duration = clock.elapsed(&start);
                if let Some(metrics) = next.metrics() {
                    debug!("stage {} took {:.3}ms", next.name(), duration_ms(duration));
                    stages.push(StageDiagnostics {
                        name: next.name().to_string(),
                        duration,
                        metrics,
                    });
                }
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }

    let staged = stage.complete()?;
    let total_duration = clock.elapsed(&total_start);
    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: staged.dimensions.pixel_count(),
        edge_pixel_count: crate::edge::count_edge_pixels(&staged.edges, staged.config.invert),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            stages,
            total_duration,
            summary,
        },
    ))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            color_type,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height} {color_type}"),
        StageMetrics::Grayscale {
            width,
            height,
            mean_intensity,
        } => format!("{width}x{height} mean={mean_intensity:.1}"),
        StageMetrics::Blur {
            border,
            mean_intensity,
        } => format!("border={border} mean={mean_intensity:.1}"),
        StageMetrics::EdgeDetection {
            threshold,
            invert,
            border,
            edge_pixel_count,
            total_pixel_count,
            max_magnitude,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "threshold={threshold:.1} invert={invert} border={border} edges={edge_pixel_count} ({density:.1}%) max={max_magnitude:.1}",
            )
        }
    }
}

/// Mean pixel intensity of a raster.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean_intensity(raster: &RasterBuffer) -> f64 {
    let pixels = raster.pixels();
    if pixels.is_empty() {
        return 0.0;
    }
    let sum: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
    sum as f64 / pixels.len() as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: std::cell::Cell<u64>,
    }

    impl TickClock {
        const fn new() -> Self {
            Self {
                ticks: std::cell::Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn gray_png(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Vec<u8> {
        let img = image::GrayImage::from_fn(width, height, |x, y| image::Luma([f(x, y)]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn mean_intensity_of_constant_raster() {
        let raster = RasterBuffer::from_fn(4, 4, |_, _| 42).unwrap();
        assert!((mean_intensity(&raster) - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn records_every_processing_stage() {
        let _ = env_logger::builder().is_test(true).try_init();
        let png = gray_png(16, 16, |x, _| if x < 8 { 0 } else { 255 });
        let (staged, diagnostics) =
            process_staged_with_diagnostics(&png, &FilterConfig::default(), &TickClock::new())
                .unwrap();

        let names: Vec<&str> = diagnostics.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["decode", "grayscale", "blur", "edges"]);
        assert_eq!(diagnostics.summary.image_width, 16);
        assert_eq!(diagnostics.summary.pixel_count, 256);
        assert_eq!(
            diagnostics.summary.edge_pixel_count,
            crate::edge::count_edge_pixels(&staged.edges, false),
        );
        assert!(diagnostics.stages.iter().all(|s| s.duration > Duration::ZERO));
        assert!(diagnostics.total_duration >= Duration::from_millis(4));
    }

    #[test]
    fn propagates_decode_errors() {
        let result =
            process_staged_with_diagnostics(&[], &FilterConfig::default(), &TickClock::new());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn stage_lookup_by_name() {
        let png = gray_png(8, 8, |_, _| 77);
        let (_, diagnostics) =
            process_staged_with_diagnostics(&png, &FilterConfig::default(), &TickClock::new())
                .unwrap();
        let Some(StageMetrics::Grayscale { mean_intensity, .. }) =
            diagnostics.stage("grayscale").map(|s| &s.metrics)
        else {
            unreachable!("grayscale stage must be recorded");
        };
        assert!((mean_intensity - 77.0).abs() < f64::EPSILON);
        assert!(diagnostics.stage("threshold").is_none());
    }

    #[test]
    fn report_mentions_every_stage() {
        let png = gray_png(8, 8, |x, _| if x < 4 { 10 } else { 240 });
        let (_, diagnostics) =
            process_staged_with_diagnostics(&png, &FilterConfig::default(), &TickClock::new())
                .unwrap();
        let report = diagnostics.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for name in ["decode", "grayscale", "blur", "edges"] {
            assert!(report.contains(name), "report is missing {name}");
        }
        assert!(report.contains("threshold=50.0"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let png = gray_png(4, 4, |_, _| 0);
        let (_, diagnostics) =
            process_staged_with_diagnostics(&png, &FilterConfig::default(), &TickClock::new())
                .unwrap();
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert!(json["total_duration"].is_f64());
        assert_eq!(json["stages"][0]["name"], "decode");
        assert_eq!(json["stages"][2]["metrics"]["Blur"]["border"], "omit");
    }

    #[test]
    fn edge_density_handles_all_edges() {
        let png = gray_png(4, 4, |_, _| 0);
        let config = FilterConfig {
            threshold: 0.0,
            ..FilterConfig::default()
        };
        let (_, diagnostics) =
            process_staged_with_diagnostics(&png, &config, &TickClock::new()).unwrap();
        assert!((diagnostics.edge_density() - 1.0).abs() < f64::EPSILON);
    }
}
