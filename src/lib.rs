//! # videoboost
//!
//! Upscale videos frame by frame through a fixed-shape super-resolution
//! model.
//!
//! Every frame of the input's primary video track is decoded, packed into a
//! `1 × 3 × H × W` tensor, run through an [`InferenceProvider`], unpacked
//! back into pixels, and encoded into a new container whose dimensions are
//! the input's multiplied by the declared scale factor. Decoding and
//! encoding are powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Upscale a File
//!
//! ```no_run
//! use videoboost::{ResampleProvider, TensorShape, VideoUpscaler};
//!
//! let provider = ResampleProvider::new(TensorShape::image(3, 256, 256), 4).unwrap();
//! let upscaler = VideoUpscaler::new(provider);
//! let report = upscaler.upscale_blocking("input.mp4").unwrap();
//! println!("{} -> {}", report.stats.frames_written, report.output.display());
//! ```
//!
//! ### Background Upscale with a Completion Callback
//!
//! ```no_run
//! use videoboost::{FailurePolicy, ResampleProvider, TensorShape, UpscaleOptions, VideoUpscaler};
//!
//! let provider = ResampleProvider::new(TensorShape::image(3, 256, 256), 4).unwrap();
//! let options = UpscaleOptions::new()
//!     .with_output_path("output.mp4")
//!     .with_failure_policy(FailurePolicy::HoldPrevious);
//! let upscaler = VideoUpscaler::with_options(provider, options);
//!
//! let job = upscaler
//!     .upscale("input.mp4", |result| match result {
//!         Ok(path) => println!("Done: {}", path.display()),
//!         Err(error) => eprintln!("Failed: {error}"),
//!     })
//!     .unwrap();
//! job.join().unwrap();
//! ```
//!
//! ### Drive the Pipeline Yourself
//!
//! [`Pipeline`] is generic over [`FrameSource`] and [`FrameSink`], so any
//! decoder or encoder can be plugged in:
//!
//! ```no_run
//! use std::path::Path;
//!
//! use videoboost::{
//!     FfmpegSink, FfmpegSource, PixelLayout, Pipeline, ResampleProvider, TensorShape,
//!     UpscaleOptions,
//! };
//!
//! let mut provider = ResampleProvider::new(TensorShape::image(3, 128, 128), 2).unwrap();
//! let options = UpscaleOptions::new().with_scale_factor(2);
//! let mut pipeline = Pipeline::new(&mut provider, &options);
//! let report = pipeline
//!     .run(
//!         || FfmpegSource::open("input.mp4", PixelLayout::Bgra),
//!         FfmpegSink::open,
//!         Path::new("output.mp4"),
//!     )
//!     .unwrap();
//! println!("{:?}", report.stats);
//! ```
//!
//! ## Features
//!
//! - **Pluggable models**: any fixed-shape tensor-in, tensor-out
//!   [`InferenceProvider`]
//! - **Frame-failure policies**: skip, abort, retry inference, or repeat the
//!   previous frame
//! - **Numeric safety**: non-finite model outputs become black, everything
//!   else is rounded and clamped
//! - **Gap-free timestamps**: output frames are stamped by their position in
//!   the output, starting at zero
//! - **Progress & cancellation**: cooperative callbacks and
//!   [`CancellationToken`]
//! - **No partial outputs**: a failed invocation removes what it wrote
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `VideoUpscaler::upscale_async` and `UpscaleFuture` via Tokio |
//! | `onnx` | `OnnxProvider` runs ONNX super-resolution models with `tract` |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
mod conversion;
pub mod error;
pub mod ffmpeg;
pub mod frame;
#[cfg(feature = "async")]
pub mod future;
pub mod inference;
pub mod metadata;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod packer;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod source;
pub mod tensor;
pub mod unpacker;
pub mod upscaler;

pub use configuration::{
    DEFAULT_SCALE_FACTOR, FailurePolicy, ResizeFilter, SampleRange, UpscaleOptions,
};
pub use error::UpscaleError;
pub use ffmpeg::{FfmpegLogLevel, ffmpeg_log_level, set_ffmpeg_log_level};
pub use frame::{ChannelOffsets, Frame, FrameRate, PixelLayout, Timestamp};
#[cfg(feature = "async")]
pub use future::UpscaleFuture;
pub use inference::{InferenceProvider, ResampleProvider};
pub use metadata::TrackMetadata;
#[cfg(feature = "onnx")]
pub use onnx::OnnxProvider;
pub use packer::TensorPacker;
pub use pipeline::{Pipeline, PipelineState, PipelineStats, UpscaleReport};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use sink::{FfmpegSink, FrameSink, SinkSettings, VideoCodec};
pub use source::{FfmpegSource, FrameSource, SourceStatus};
pub use tensor::{Tensor, TensorShape};
pub use unpacker::TensorUnpacker;
pub use upscaler::{UpscaleJob, VideoUpscaler};
