//! Upscale configuration.
//!
//! [`UpscaleOptions`] is a builder that threads the encoder settings, model
//! conversion settings, frame-failure policy, progress callbacks, and
//! cancellation tokens through an upscale invocation without polluting every
//! function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use videoboost::{
//!     CancellationToken, FailurePolicy, ProgressCallback, ProgressInfo, UpscaleOptions,
//!     VideoCodec,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} frames written", info.frames_written);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = UpscaleOptions::new()
//!     .with_codec(VideoCodec::H265)
//!     .with_failure_policy(FailurePolicy::Retry { attempts: 2 })
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;

use crate::error::UpscaleError;
use crate::frame::{FrameRate, PixelLayout};
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::sink::VideoCodec;

/// Spatial magnification of the reference model.
pub const DEFAULT_SCALE_FACTOR: u32 = 4;

/// What to do with a frame whose pack, inference, unpack, or append step
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Drop the frame and keep going. Surviving frames are timestamped by
    /// their surviving index, so the output gets shorter. This is the
    /// default.
    #[default]
    Skip,
    /// Stop the invocation with [`UpscaleError::FrameFailed`].
    Abort,
    /// Re-run inference up to `attempts` extra times, then skip.
    Retry {
        /// Extra inference attempts after the first failure.
        attempts: u32,
    },
    /// Append the previous upscaled frame again so the output keeps the
    /// input's duration. Behaves like `Skip` until a first frame succeeds.
    HoldPrevious,
}

/// Numeric range of model tensor samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRange {
    /// Samples in `0.0..=1.0`. This is the default.
    #[default]
    Unit,
    /// Samples in `0.0..=255.0`.
    Byte,
}

impl SampleRange {
    /// Multiplier mapping a sample onto the 8-bit channel range.
    pub fn to_byte_scale(self) -> f32 {
        match self {
            SampleRange::Unit => 255.0,
            SampleRange::Byte => 1.0,
        }
    }
}

/// Resampling filter used when fitting a frame to the model's input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Nearest neighbour.
    Nearest,
    /// Bilinear. This is the default.
    #[default]
    Triangle,
    /// Catmull-Rom cubic.
    CatmullRom,
    /// Lanczos with window 3.
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn to_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for an upscale invocation.
///
/// All fields have sensible defaults: ×4, H.264 at CRF 23, skip failed
/// frames, unit-range tensors, bilinear resize, BGRA decode.
#[derive(Clone)]
pub struct UpscaleOptions {
    pub(crate) scale_factor: u32,
    pub(crate) codec: VideoCodec,
    pub(crate) crf: Option<u32>,
    pub(crate) bitrate: Option<usize>,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) failure_policy: FailurePolicy,
    pub(crate) sample_range: SampleRange,
    pub(crate) resize_filter: ResizeFilter,
    pub(crate) decode_layout: PixelLayout,
    pub(crate) fallback_frame_rate: FrameRate,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
}

impl Debug for UpscaleOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UpscaleOptions")
            .field("scale_factor", &self.scale_factor)
            .field("codec", &self.codec)
            .field("crf", &self.crf)
            .field("bitrate", &self.bitrate)
            .field("output_path", &self.output_path)
            .field("failure_policy", &self.failure_policy)
            .field("sample_range", &self.sample_range)
            .field("resize_filter", &self.resize_filter)
            .field("decode_layout", &self.decode_layout)
            .field("fallback_frame_rate", &self.fallback_frame_rate)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for UpscaleOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl UpscaleOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            codec: VideoCodec::H264,
            crf: Some(23),
            bitrate: None,
            output_path: None,
            failure_policy: FailurePolicy::Skip,
            sample_range: SampleRange::Unit,
            resize_filter: ResizeFilter::Triangle,
            decode_layout: PixelLayout::Bgra,
            fallback_frame_rate: FrameRate::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the declared upscale factor. Output dimensions are the input
    /// dimensions multiplied by this value.
    #[must_use]
    pub fn with_scale_factor(mut self, factor: u32) -> Self {
        self.scale_factor = factor;
        self
    }

    /// Set the output codec.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the Constant Rate Factor (0-51, lower is better).
    #[must_use]
    pub fn with_crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Set a target bitrate in bits per second. Overrides CRF.
    #[must_use]
    pub fn with_bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Write the output container to `path` instead of the temp directory.
    #[must_use]
    pub fn with_output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Choose how per-frame failures are handled.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the numeric range the model expects and produces.
    #[must_use]
    pub fn with_sample_range(mut self, range: SampleRange) -> Self {
        self.sample_range = range;
        self
    }

    /// Set the filter used to fit frames to the model input size.
    #[must_use]
    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Set the interleaved layout frames are decoded into.
    #[must_use]
    pub fn with_decode_layout(mut self, layout: PixelLayout) -> Self {
        self.decode_layout = layout;
        self
    }

    /// Frame rate used when the input track does not declare one.
    #[must_use]
    pub fn with_fallback_frame_rate(mut self, rate: FrameRate) -> Self {
        self.fallback_frame_rate = rate;
        self
    }

    /// Attach a progress callback, fired every
    /// [`batch_size`](UpscaleOptions::with_batch_size) processed frames.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token, checked once per frame.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The declared upscale factor.
    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    /// The configured failure policy.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// The configured output codec.
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// The output location for `input`: the configured path, or
    /// `<temp dir>/<input stem>_x<factor>.mp4`.
    pub fn resolve_output_path(&self, input: &Path) -> PathBuf {
        if let Some(path) = &self.output_path {
            return path.clone();
        }
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        std::env::temp_dir().join(format!("{stem}_x{}.mp4", self.scale_factor))
    }

    /// Check that these options can drive a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::InvalidConfiguration`] for a zero scale
    /// factor or a CRF above 51.
    pub fn validate(&self) -> Result<(), UpscaleError> {
        if self.scale_factor == 0 {
            return Err(UpscaleError::InvalidConfiguration(
                "scale factor must be greater than zero".to_string(),
            ));
        }
        if let Some(crf) = self.crf
            && crf > 51
        {
            return Err(UpscaleError::InvalidConfiguration(format!(
                "crf {crf} is outside 0..=51"
            )));
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
