//! Video track metadata.
//!
//! [`TrackMetadata`] is read once when a [`FrameSource`](crate::FrameSource)
//! is opened and never changes afterwards. The pipeline derives the output
//! container's dimensions and presentation timestamps from it.

use std::time::Duration;

use crate::frame::FrameRate;

/// Immutable description of the video track being upscaled.
///
/// # Example
///
/// ```no_run
/// use videoboost::{FfmpegSource, FrameSource, PixelLayout};
///
/// let source = FfmpegSource::open("input.mp4", PixelLayout::Bgra)?;
/// let track = source.metadata();
/// println!("{}x{} @ {} fps", track.width, track.height, track.frame_rate);
/// # Ok::<(), videoboost::UpscaleError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct TrackMetadata {
    /// Natural frame width in pixels.
    pub width: u32,
    /// Natural frame height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub frame_rate: FrameRate,
    /// Codec name (e.g. `"h264"`), `"unknown"` when not reported.
    pub codec: String,
    /// Container duration. Zero when unknown.
    pub duration: Duration,
    /// Estimated frame count, computed from duration and frame rate.
    pub frame_count: u64,
}

impl TrackMetadata {
    /// Metadata for a track with no codec or duration information.
    pub fn new(width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            width,
            height,
            frame_rate,
            codec: "unknown".to_string(),
            duration: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Output dimensions after applying an integer upscale factor, or
    /// `None` if either side overflows.
    pub fn scaled_dimensions(&self, factor: u32) -> Option<(u32, u32)> {
        Some((
            self.width.checked_mul(factor)?,
            self.height.checked_mul(factor)?,
        ))
    }

    /// Estimated frame count, or `None` when the container did not report a
    /// duration.
    pub fn estimated_frames(&self) -> Option<u64> {
        (self.frame_count > 0).then_some(self.frame_count)
    }
}
