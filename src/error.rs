//! Error types for the `videoboost` crate.
//!
//! This module defines [`UpscaleError`], the unified error type returned by
//! every fallible operation in the crate. Variants are split between errors
//! that only affect a single frame (the pipeline may drop the frame and keep
//! going) and errors that end the whole invocation.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `videoboost` operations.
///
/// Every public method that can fail returns `Result<T, UpscaleError>`.
/// Use [`is_per_frame`](UpscaleError::is_per_frame) to tell recoverable
/// frame-level failures apart from invocation-level ones.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpscaleError {
    /// The inference provider could not be initialized.
    #[error("Inference model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input asset could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::FfmpegSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The input asset does not contain a video track.
    #[error("No video track found in file")]
    NoVideoTrack,

    /// A frame (or the whole stream) could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    DecodeError(String),

    /// A frame could not be converted into a model-input tensor.
    #[error("Failed to pack frame into tensor: {0}")]
    PackError(String),

    /// The inference provider rejected or failed on a tensor.
    #[error("Inference failed: {0}")]
    InferError(String),

    /// A model-output tensor could not be converted back into pixels.
    #[error("Failed to unpack tensor into frame: {0}")]
    UnpackError(String),

    /// The output container could not be opened or a frame could not be
    /// appended to it.
    #[error("Video encoding error: {0}")]
    EncodeError(String),

    /// Encoded packets could not be written to the output container. The
    /// container is no longer consistent, so this ends the invocation.
    #[error("Failed to write to output container: {0}")]
    MuxError(String),

    /// Flushing or closing the output container failed.
    #[error("Failed to finalize output container: {0}")]
    FinalizeError(String),

    /// A frame failed and the configured policy escalates frame failures.
    #[error("Frame {frame_index} failed: {source}")]
    FrameFailed {
        /// Zero-based decode index of the failing frame.
        frame_index: u64,
        /// The per-frame error that triggered the abort.
        #[source]
        source: Box<UpscaleError>,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An upscale invocation is already in flight on this upscaler.
    #[error("An upscale is already running on this upscaler")]
    AlreadyRunning,

    /// The supplied options cannot drive a pipeline.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl UpscaleError {
    /// Returns `true` for errors scoped to a single frame.
    ///
    /// The pipeline consults its [`FailurePolicy`](crate::FailurePolicy) for
    /// these; every other variant ends the invocation.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            UpscaleError::DecodeError(_)
                | UpscaleError::PackError(_)
                | UpscaleError::InferError(_)
                | UpscaleError::UnpackError(_)
                | UpscaleError::EncodeError(_)
        )
    }
}

impl From<FfmpegError> for UpscaleError {
    fn from(error: FfmpegError) -> Self {
        UpscaleError::FfmpegError(error.to_string())
    }
}
