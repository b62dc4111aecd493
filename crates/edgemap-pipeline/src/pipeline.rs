//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use edgemap_pipeline::{FilterConfig, Pipeline, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, FilterConfig::default())
//!     .decode()?
//!     .grayscale()?
//!     .blur()
//!     .detect_edges()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying the previously computed
//! rasters. The caller can inspect the current stage's output via
//! accessor methods at any point.
//!
//! # Re-thresholding
//!
//! Only the Sobel stage depends on the threshold and polarity.
//! [`EdgesDetected`] keeps the blurred raster and the gradient
//! magnitudes, so [`EdgesDetected::rethreshold`] produces a new edge
//! map without repeating any convolution.

use image::DynamicImage;
use log::{debug, trace};

use crate::diagnostics::StageMetrics;
use crate::edge::MagnitudeMap;
use crate::raster::RasterBuffer;
use crate::types::{FilterConfig, PipelineError, StagedResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: FilterConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source bytes are
    /// empty. Returns [`PipelineError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let source_len = self.source.len();
        let image = crate::grayscale::decode(&self.source)?;
        debug!(
            "decoded {}x{} {:?} image from {source_len} bytes",
            image.width(),
            image.height(),
            image.color(),
        );
        Ok(Decoded {
            config: self.config,
            image,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`grayscale`](Self::grayscale) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .grayscale() to continue"]
pub struct Decoded {
    config: FilterConfig,
    image: DynamicImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded multi-channel image.
    #[must_use]
    pub const fn original(&self) -> &DynamicImage {
        &self.image
    }

    /// Convert to a single-channel intensity raster.
    ///
    /// The filter configuration is validated here, so both entry points
    /// ([`Pipeline::new`] and [`Pipeline::from_image`]) reject a bad
    /// config before any filtering work.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration is
    /// invalid, and [`PipelineError::InvalidDimensions`] if the image is
    /// empty.
    pub fn grayscale(self) -> Result<Grayscale, PipelineError> {
        self.config.validate()?;
        let intensity = crate::grayscale::to_intensity(&self.image)?;
        debug!(
            "converted to {}x{} intensity raster",
            intensity.width(),
            intensity.height(),
        );
        Ok(Grayscale {
            config: self.config,
            intensity,
        })
    }
}

// ───────────────────────── Stage 2: Grayscale ────────────────────────

/// Pipeline state after grayscale conversion.
///
/// Call [`blur`](Self::blur) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .blur() to continue"]
pub struct Grayscale {
    config: FilterConfig,
    intensity: RasterBuffer,
}

impl Grayscale {
    /// The intensity raster.
    #[must_use]
    pub const fn intensity(&self) -> &RasterBuffer {
        &self.intensity
    }

    /// Advance to the blur stage.
    pub fn blur(self) -> Blurred {
        let blurred = crate::blur::box_blur(&self.intensity, self.config.border);
        debug!("applied 3x3 box blur ({} border)", self.config.border);
        Blurred {
            config: self.config,
            grayscale: self.intensity,
            blurred,
        }
    }
}

// ───────────────────────── Stage 3: Blurred ──────────────────────────

/// Pipeline state after the box blur.
///
/// Call [`detect_edges`](Self::detect_edges) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .detect_edges() to continue"]
pub struct Blurred {
    config: FilterConfig,
    grayscale: RasterBuffer,
    blurred: RasterBuffer,
}

impl Blurred {
    /// The blurred intensity raster.
    #[must_use]
    pub const fn blurred(&self) -> &RasterBuffer {
        &self.blurred
    }

    /// Advance to the edge detection stage.
    ///
    /// Computes the Sobel gradient magnitude of every pixel and
    /// thresholds it with `config.threshold` and `config.invert`.
    pub fn detect_edges(self) -> EdgesDetected {
        let magnitudes = crate::edge::magnitude_map(&self.blurred, self.config.border);
        let edges = crate::edge::threshold_magnitudes(
            &magnitudes,
            self.config.threshold,
            self.config.invert,
        );
        debug!(
            "sobel threshold={} invert={} marked {} edge pixels",
            self.config.threshold,
            self.config.invert,
            crate::edge::count_edge_pixels(&edges, self.config.invert),
        );
        EdgesDetected {
            config: self.config,
            grayscale: self.grayscale,
            blurred: self.blurred,
            magnitudes,
            edges,
        }
    }
}

// ───────────────────────── Stage 4: EdgesDetected ────────────────────

/// Pipeline state after Sobel edge detection. This is the final stage.
///
/// Call [`into_result`](Self::into_result) to collect every
/// intermediate, or [`rethreshold`](Self::rethreshold) to try another
/// threshold on the same blurred raster.
#[must_use = "call .into_result() to collect the pipeline output"]
pub struct EdgesDetected {
    config: FilterConfig,
    grayscale: RasterBuffer,
    blurred: RasterBuffer,
    magnitudes: MagnitudeMap,
    edges: RasterBuffer,
}

impl EdgesDetected {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &RasterBuffer {
        &self.edges
    }

    /// The gradient magnitudes the edge map was thresholded from.
    #[must_use]
    pub const fn magnitudes(&self) -> &MagnitudeMap {
        &self.magnitudes
    }

    /// The configuration that produced the current edge map.
    #[must_use]
    pub const fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Re-run only the threshold decision with new settings.
    ///
    /// The grayscale and blurred rasters and the gradient magnitudes
    /// are reused; the border mode stays as configured.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `threshold` is not a
    /// finite non-negative number.
    pub fn rethreshold(self, threshold: f64, invert: bool) -> Result<Self, PipelineError> {
        let config = FilterConfig {
            threshold,
            invert,
            ..self.config
        };
        config.validate()?;
        trace!("rethreshold threshold={threshold} invert={invert}");
        let edges = crate::edge::threshold_magnitudes(&self.magnitudes, threshold, invert);
        Ok(Self {
            config,
            edges,
            ..self
        })
    }

    /// Consume the pipeline and return every intermediate raster.
    pub fn into_result(self) -> StagedResult {
        let dimensions = self.edges.dimensions();
        StagedResult {
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            dimensions,
            config: self.config,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 5;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source image bytes (not yet decoded).
    Source {
        /// The raw image bytes.
        bytes: &'a [u8],
    },
    /// Decoded multi-channel image.
    Decoded {
        /// The original image.
        original: &'a DynamicImage,
    },
    /// Intensity raster.
    Grayscale {
        /// The single-channel raster.
        intensity: &'a RasterBuffer,
    },
    /// Box blur result.
    Blurred {
        /// The blurred raster.
        blurred: &'a RasterBuffer,
    },
    /// Sobel result.
    EdgesDetected {
        /// The binary edge map.
        edges: &'a RasterBuffer,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"blur"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `4` for
    /// `EdgesDetected`).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Metrics describing the work done to reach this stage.
    ///
    /// Returns `None` for [`Pending`], which has not processed anything.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] from decoding, config validation or
    /// grayscale conversion.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.image,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.image.width(),
            height: self.image.height(),
            pixel_count: u64::from(self.image.width()) * u64::from(self.image.height()),
            color_type: format!("{:?}", self.image.color()),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Grayscale(self.grayscale()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.grayscale()?.complete()
    }
}

impl PipelineStage for Grayscale {
    const NAME: &str = "grayscale";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Grayscale {
            intensity: &self.intensity,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Grayscale {
            width: self.intensity.width(),
            height: self.intensity.height(),
            mean_intensity: crate::diagnostics::mean_intensity(&self.intensity),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Blurred(self.blur())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.blur().complete()
    }
}

impl PipelineStage for Blurred {
    const NAME: &str = "blur";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Blurred {
            blurred: &self.blurred,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Blur {
            border: self.config.border,
            mean_intensity: crate::diagnostics::mean_intensity(&self.blurred),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::EdgesDetected(self.detect_edges())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.detect_edges().complete()
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &str = "edges";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::EdgesDetected { edges: &self.edges }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::EdgeDetection {
            threshold: self.config.threshold,
            invert: self.config.invert,
            border: self.config.border,
            edge_pixel_count: crate::edge::count_edge_pixels(&self.edges, self.config.invert),
            total_pixel_count: self.edges.dimensions().pixel_count(),
            max_magnitude: self.magnitudes.max(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use edgemap_pipeline::{FilterConfig, Pipeline, PipelineError};
/// # use edgemap_pipeline::pipeline::{Advance, Stage};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(png, FilterConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Grayscale`].
    Grayscale(Grayscale),
    /// See [`Blurred`].
    Blurred(Blurred),
    /// See [`EdgesDetected`].
    EdgesDetected(EdgesDetected),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails until you bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Grayscale(_)
        | Stage::Blurred(_)
        | Stage::EdgesDetected(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage and is returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Grayscale(s) => s.$method($($arg),*),
            Self::Blurred(s) => s.$method($($arg),*),
            Self::EdgesDetected(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::EdgesDetected(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // The is_complete() guard above ensures next() yields Some here.
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro call `.name()` and `.index()` on `&self`; the
// associated constants aren't reachable as `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Decoded> for Stage {
    fn from(s: Decoded) -> Self {
        Self::Decoded(s)
    }
}

impl From<Grayscale> for Stage {
    fn from(s: Grayscale) -> Self {
        Self::Grayscale(s)
    }
}

impl From<Blurred> for Stage {
    fn from(s: Blurred) -> Self {
        Self::Blurred(s)
    }
}

impl From<EdgesDetected> for Stage {
    fn from(s: EdgesDetected) -> Self {
        Self::EdgesDetected(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental edge detection pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from encoded image bytes and config.
    ///
    /// No processing is performed; call [`.decode()`](Pending::decode)
    /// (or convert to a [`Stage`] and loop) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: FilterConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Start from an image that a collaborator has already decoded.
    pub const fn from_image(image: DynamicImage, config: FilterConfig) -> Decoded {
        Decoded {
            config,
            image,
            source_len: 0,
        }
    }
}
