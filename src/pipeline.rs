//! The frame-level upscale pipeline.
//!
//! [`Pipeline`] drives one invocation through its states:
//!
//! ```text
//! Idle → Reading → (Packing → Inferring → Unpacking → Appending)* → Finishing → Completed | Failed
//! ```
//!
//! Frames are pulled one at a time from a [`FrameSource`], packed into the
//! provider's input tensor, run through the [`InferenceProvider`], unpacked
//! into a pixel buffer, and appended to a [`FrameSink`]. Per-frame failures
//! are handled according to the configured [`FailurePolicy`]; stream-level
//! and finalize failures fail the whole invocation and remove the partial
//! output.
//!
//! The pipeline is generic over its source and sink, so it can be driven by
//! FFmpeg ([`VideoUpscaler`](crate::VideoUpscaler) does that) or by
//! in-memory collaborators.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::configuration::{FailurePolicy, UpscaleOptions};
use crate::error::UpscaleError;
use crate::frame::{Frame, Timestamp};
use crate::inference::InferenceProvider;
use crate::metadata::TrackMetadata;
use crate::packer::TensorPacker;
use crate::progress::{Counters, ProgressTracker};
use crate::sink::{FrameSink, SinkSettings};
use crate::source::{FrameSource, SourceStatus};
use crate::tensor::Tensor;
use crate::unpacker::TensorUnpacker;

/// Where a [`Pipeline`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, not started.
    Idle,
    /// Source and sink are open; waiting on the next frame.
    Reading,
    /// Converting a frame into a tensor.
    Packing,
    /// Waiting on the inference provider.
    Inferring,
    /// Converting the provider's output back into pixels.
    Unpacking,
    /// Handing an upscaled frame to the sink.
    Appending,
    /// Flushing and closing the sink.
    Finishing,
    /// The output container was finalized successfully.
    Completed,
    /// The invocation failed; no output is exposed.
    Failed,
}

impl PipelineState {
    /// `true` once the pipeline reached `Completed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

/// Per-invocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Frames pulled from the source, including ones that failed to decode.
    pub frames_read: u64,
    /// Frames the provider returned a valid tensor for.
    pub frames_inferred: u64,
    /// Frames appended to the sink, including repeated ones.
    pub frames_written: u64,
    /// Frames lost to a per-frame failure.
    pub frames_dropped: u64,
    /// Frames replaced by a repeat of the previous output frame.
    pub frames_repeated: u64,
    /// Frames the source failed to decode.
    pub decode_errors: u64,
}

impl PipelineStats {
    fn counters(&self) -> Counters {
        Counters {
            read: self.frames_read,
            written: self.frames_written,
            dropped: self.frames_dropped,
        }
    }
}

/// Outcome of a completed invocation.
#[derive(Debug, Clone)]
pub struct UpscaleReport {
    /// Location of the finalized container.
    pub output: PathBuf,
    /// Metadata of the input track.
    pub input: TrackMetadata,
    /// Declared output width.
    pub width: u32,
    /// Declared output height.
    pub height: u32,
    /// Final counters.
    pub stats: PipelineStats,
    /// Wall-clock duration of the invocation.
    pub elapsed: Duration,
}

/// A single-use driver for one upscale invocation.
pub struct Pipeline<'a> {
    provider: &'a mut dyn InferenceProvider,
    options: &'a UpscaleOptions,
    packer: TensorPacker,
    unpacker: TensorUnpacker,
    state: PipelineState,
    stats: PipelineStats,
}

impl<'a> Pipeline<'a> {
    /// Prepare a pipeline around `provider`.
    pub fn new(provider: &'a mut dyn InferenceProvider, options: &'a UpscaleOptions) -> Self {
        let packer = TensorPacker::new(provider.input_shape())
            .with_filter(options.resize_filter)
            .with_sample_range(options.sample_range);
        let unpacker = TensorUnpacker::new()
            .with_sample_range(options.sample_range)
            .with_layout(options.decode_layout);
        Self {
            provider,
            options,
            packer,
            unpacker,
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Run the invocation to a terminal state.
    ///
    /// `open_source` is called first; `open_sink` receives the output
    /// settings derived from the source's track metadata and is only called
    /// once the source opened. On failure any file at `output` written by
    /// this invocation is removed; a file that was already there is left
    /// alone unless the sink opened and took it over.
    ///
    /// # Errors
    ///
    /// - [`UpscaleError::AlreadyRunning`] if this pipeline already ran.
    /// - Any error from opening the source or sink, a stream-level decode
    ///   failure, [`UpscaleError::Cancelled`], [`UpscaleError::FrameFailed`]
    ///   under [`FailurePolicy::Abort`], or the sink's finalize error.
    pub fn run<S, K, OpenSource, OpenSink>(
        &mut self,
        open_source: OpenSource,
        open_sink: OpenSink,
        output: &Path,
    ) -> Result<UpscaleReport, UpscaleError>
    where
        S: FrameSource,
        K: FrameSink,
        OpenSource: FnOnce() -> Result<S, UpscaleError>,
        OpenSink: FnOnce(&SinkSettings) -> Result<K, UpscaleError>,
    {
        if self.state != PipelineState::Idle {
            return Err(UpscaleError::AlreadyRunning);
        }

        let started = Instant::now();
        let result = self.run_to_completion(open_source, open_sink, output);
        match &result {
            Ok(report) => {
                self.transition(PipelineState::Completed);
                log::info!(
                    "Upscaled {} of {} frame(s) into {} ({} dropped, {} repeated) in {:.2}s",
                    report.stats.frames_written,
                    report.stats.frames_read,
                    report.output.display(),
                    report.stats.frames_dropped,
                    report.stats.frames_repeated,
                    started.elapsed().as_secs_f64(),
                );
            }
            Err(error) => {
                self.transition(PipelineState::Failed);
                log::error!("Upscale failed: {error}");
            }
        }
        result.map(|report| UpscaleReport {
            elapsed: started.elapsed(),
            ..report
        })
    }

    fn run_to_completion<S, K, OpenSource, OpenSink>(
        &mut self,
        open_source: OpenSource,
        open_sink: OpenSink,
        output: &Path,
    ) -> Result<UpscaleReport, UpscaleError>
    where
        S: FrameSource,
        K: FrameSink,
        OpenSource: FnOnce() -> Result<S, UpscaleError>,
        OpenSink: FnOnce(&SinkSettings) -> Result<K, UpscaleError>,
    {
        self.options.validate()?;
        let input_shape = self.provider.input_shape();
        if input_shape.batch != 1 || input_shape.channels != 3 || input_shape.is_empty() {
            return Err(UpscaleError::InvalidConfiguration(format!(
                "provider {} expects {input_shape}, only 1x3xHxW inputs are supported",
                self.provider.name()
            )));
        }

        let output_existed = output.exists();
        self.transition(PipelineState::Reading);
        let mut source = open_source()?;
        let metadata = source.metadata().clone();

        let factor = self.options.scale_factor;
        let Some((width, height)) = metadata.scaled_dimensions(factor) else {
            return Err(UpscaleError::InvalidConfiguration(format!(
                "{}x{} scaled by {factor} overflows",
                metadata.width, metadata.height
            )));
        };

        let settings = SinkSettings {
            output: output.to_path_buf(),
            codec: self.options.codec,
            width,
            height,
            frame_rate: metadata.frame_rate,
            crf: self.options.crf,
            bitrate: self.options.bitrate,
        };
        log::debug!(
            "Upscaling {}x{} -> {}x{} with provider {} ({} -> {})",
            metadata.width,
            metadata.height,
            width,
            height,
            self.provider.name(),
            input_shape,
            self.provider.output_shape(),
        );

        let mut sink = match open_sink(&settings) {
            Ok(sink) => sink,
            Err(error) => {
                if !output_existed {
                    discard_output(output);
                }
                return Err(error);
            }
        };

        let loop_result = self.drive(&mut source, &mut sink, &metadata);

        self.transition(PipelineState::Finishing);
        let finish_result = sink.finish();

        match (loop_result, finish_result) {
            (Ok(()), Ok(path)) => Ok(UpscaleReport {
                output: path,
                input: metadata,
                width,
                height,
                stats: self.stats,
                elapsed: Duration::ZERO,
            }),
            (Err(error), finish_result) => {
                if let Err(finish_error) = finish_result {
                    log::debug!("Finalize after failure also failed: {finish_error}");
                }
                discard_output(output);
                Err(error)
            }
            (Ok(()), Err(error)) => {
                discard_output(output);
                Err(error)
            }
        }
    }

    /// The per-frame loop. Returns once the source is exhausted or a
    /// non-recoverable error occurs.
    fn drive<S: FrameSource, K: FrameSink>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        metadata: &TrackMetadata,
    ) -> Result<(), UpscaleError> {
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            metadata.estimated_frames(),
            self.options.batch_size,
        );
        let frame_rate = metadata.frame_rate;
        // Only frames that reach the sink consume a timestamp slot.
        let mut surviving_index: u64 = 0;
        let mut previous: Option<Frame> = None;

        loop {
            if self.options.is_cancelled() {
                return Err(UpscaleError::Cancelled);
            }

            match source.status() {
                SourceStatus::Reading => {}
                SourceStatus::Completed => break,
                SourceStatus::Failed => {
                    return Err(UpscaleError::DecodeError(
                        "source stopped with an unrecoverable error".to_string(),
                    ));
                }
            }

            self.transition(PipelineState::Reading);
            let pulled = source.next_frame();
            let frame_index = self.stats.frames_read;

            let outcome = match pulled {
                Ok(None) => break,
                Ok(Some(frame)) => {
                    self.stats.frames_read += 1;
                    self.process_frame(frame)
                }
                Err(error) if source.status() == SourceStatus::Failed => return Err(error),
                Err(error) => {
                    self.stats.frames_read += 1;
                    self.stats.decode_errors += 1;
                    Err(error)
                }
            };

            let appended = outcome.and_then(|upscaled| {
                self.transition(PipelineState::Appending);
                sink.append(&upscaled, frame_rate.timestamp(surviving_index))?;
                Ok(upscaled)
            });

            match appended {
                Ok(upscaled) => {
                    surviving_index += 1;
                    self.stats.frames_written += 1;
                    if self.options.failure_policy == FailurePolicy::HoldPrevious {
                        previous = Some(upscaled);
                    }
                }
                Err(error) if error.is_per_frame() => {
                    let slot = frame_rate.timestamp(surviving_index);
                    if self.recover(frame_index, error, sink, slot, previous.as_ref())? {
                        surviving_index += 1;
                    }
                }
                Err(error) => return Err(error),
            }

            let last_timestamp = surviving_index
                .checked_sub(1)
                .map(|index| frame_rate.timestamp(index).as_duration());
            tracker.advance(self.stats.counters(), last_timestamp);
        }

        tracker.finish(self.stats.counters());
        Ok(())
    }

    /// Pack, infer, and unpack one frame. The frame is released as soon as
    /// it has been packed.
    fn process_frame(&mut self, frame: Frame) -> Result<Frame, UpscaleError> {
        self.transition(PipelineState::Packing);
        let tensor = self.packer.pack(&frame)?;
        drop(frame);

        self.transition(PipelineState::Inferring);
        let output = self.infer_with_retry(&tensor)?;
        drop(tensor);
        self.stats.frames_inferred += 1;

        self.transition(PipelineState::Unpacking);
        self.unpacker.unpack(&output)
    }

    fn infer_with_retry(&mut self, tensor: &Tensor) -> Result<Tensor, UpscaleError> {
        let extra_attempts = match self.options.failure_policy {
            FailurePolicy::Retry { attempts } => attempts,
            _ => 0,
        };
        let mut attempt = 0;
        loop {
            match self.infer_checked(tensor) {
                Ok(output) => return Ok(output),
                Err(error) if attempt < extra_attempts => {
                    attempt += 1;
                    log::debug!("Inference attempt {attempt} failed, retrying: {error}");
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One provider call, with the declared output contract enforced.
    fn infer_checked(&mut self, tensor: &Tensor) -> Result<Tensor, UpscaleError> {
        let expected = self.provider.output_shape();
        let output = self.provider.infer(tensor).map_err(|error| match error {
            UpscaleError::InferError(_) => error,
            other => UpscaleError::InferError(other.to_string()),
        })?;
        if output.shape() != expected {
            return Err(UpscaleError::InferError(format!(
                "provider {} returned {}, declared {expected}",
                self.provider.name(),
                output.shape()
            )));
        }
        Ok(output)
    }

    /// Apply the failure policy to a frame that did not make it into the
    /// sink. Returns `true` if a replacement frame consumed a timestamp slot.
    fn recover<K: FrameSink>(
        &mut self,
        frame_index: u64,
        error: UpscaleError,
        sink: &mut K,
        timestamp: Timestamp,
        previous: Option<&Frame>,
    ) -> Result<bool, UpscaleError> {
        match (self.options.failure_policy, previous) {
            (FailurePolicy::Abort, _) => Err(UpscaleError::FrameFailed {
                frame_index,
                source: Box::new(error),
            }),
            (FailurePolicy::HoldPrevious, Some(previous)) => {
                log::warn!("Repeating previous frame in place of frame {frame_index}: {error}");
                self.transition(PipelineState::Appending);
                match sink.append(previous, timestamp) {
                    Ok(()) => {
                        self.stats.frames_written += 1;
                        self.stats.frames_repeated += 1;
                        Ok(true)
                    }
                    Err(append_error) if append_error.is_per_frame() => {
                        log::warn!("Dropping frame {frame_index}, repeat failed: {append_error}");
                        self.stats.frames_dropped += 1;
                        Ok(false)
                    }
                    Err(append_error) => Err(append_error),
                }
            }
            _ => {
                log::warn!("Dropping frame {frame_index}: {error}");
                self.stats.frames_dropped += 1;
                Ok(false)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            log::trace!("Pipeline state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Remove a partially written output so it is never mistaken for success.
fn discard_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed partial output {}", path.display()),
        Err(error) => log::warn!("Could not remove partial output {}: {error}", path.display()),
    }
}
