//! Frame sources: demux and decode a video asset into [`Frame`]s.
//!
//! [`FrameSource`] is the pull-based contract the pipeline drives.
//! [`FfmpegSource`] implements it on top of FFmpeg, decoding one frame per
//! call and converting it to an interleaved 8-bit layout through `swscale`.
//!
//! # Example
//!
//! ```no_run
//! use videoboost::{FfmpegSource, FrameSource, PixelLayout, SourceStatus};
//!
//! let mut source = FfmpegSource::open("input.mp4", PixelLayout::Bgra)?;
//! while source.status() == SourceStatus::Reading {
//!     match source.next_frame()? {
//!         Some(frame) => println!("{}x{} at {:?}", frame.width(), frame.height(), frame.timestamp()),
//!         None => break,
//!     }
//! }
//! # Ok::<(), videoboost::UpscaleError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};

use crate::conversion::{
    layout_to_pixel, pts_to_duration, rational_to_frame_rate, video_frame_to_frame,
};
use crate::error::UpscaleError;
use crate::frame::{Frame, FrameRate, PixelLayout};
use crate::metadata::TrackMetadata;

/// Reading state of a [`FrameSource`].
///
/// Callers poll this before every pull so that exhaustion and failure can be
/// told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// More frames may be available.
    Reading,
    /// The stream was read to the end.
    Completed,
    /// The stream hit an unrecoverable error.
    Failed,
}

/// A pull-based producer of decoded frames, in decode order.
pub trait FrameSource {
    /// Metadata of the track being decoded.
    fn metadata(&self) -> &TrackMetadata;

    /// Current reading state.
    fn status(&self) -> SourceStatus;

    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` at end of stream. An `Err` while
    /// [`status`](FrameSource::status) is still `Reading` affects only the
    /// frame being decoded; an `Err` that moves the status to `Failed` ends
    /// the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, UpscaleError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn metadata(&self) -> &TrackMetadata {
        (**self).metadata()
    }

    fn status(&self) -> SourceStatus {
        (**self).status()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, UpscaleError> {
        (**self).next_frame()
    }
}

/// FFmpeg-backed [`FrameSource`] for the best video stream of a file.
pub struct FfmpegSource {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Option<(ScalingContext, (Pixel, u32, u32))>,
    video_stream_index: usize,
    time_base: Rational,
    layout: PixelLayout,
    metadata: TrackMetadata,
    decoded_frame: VideoFrame,
    converted_frame: VideoFrame,
    eof_sent: bool,
    status: SourceStatus,
    file_path: PathBuf,
}

impl Debug for FfmpegSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegSource")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("layout", &self.layout)
            .field("status", &self.status)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl FfmpegSource {
    /// Open `path`, assuming 30 fps when the track declares no rate.
    ///
    /// # Errors
    ///
    /// - [`UpscaleError::FileOpen`] if the file cannot be opened or its
    ///   decoder cannot be created.
    /// - [`UpscaleError::NoVideoTrack`] if the file has no video stream.
    pub fn open<P: AsRef<Path>>(path: P, layout: PixelLayout) -> Result<Self, UpscaleError> {
        Self::open_with_fallback(path, layout, FrameRate::default())
    }

    /// Open `path`, using `fallback_rate` when the track declares no rate.
    pub fn open_with_fallback<P: AsRef<Path>>(
        path: P,
        layout: PixelLayout,
        fallback_rate: FrameRate,
    ) -> Result<Self, UpscaleError> {
        let file_path = path.as_ref().to_path_buf();
        log::debug!("Opening video source: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| UpscaleError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| UpscaleError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(UpscaleError::NoVideoTrack)?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| UpscaleError::FileOpen {
                path: file_path.clone(),
                reason: format!(
                    "Failed to create video decoder for stream {video_stream_index}: {error}"
                ),
            })?;

        let frame_rate = rational_to_frame_rate(stream.avg_frame_rate())
            .or_else(|| rational_to_frame_rate(stream.rate()))
            .unwrap_or_else(|| {
                log::warn!(
                    "Video stream {video_stream_index} declares no frame rate, assuming {fallback_rate} fps"
                );
                fallback_rate
            });

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else if stream.duration() > 0 {
            pts_to_duration(stream.duration(), time_base)
        } else {
            Duration::ZERO
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            (duration.as_secs_f64() * frame_rate.as_f64()) as u64
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = TrackMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frame_rate,
            codec,
            duration,
            frame_count,
        };

        log::info!(
            "Opened video source: {} ({}x{}, {} fps, codec={}, ~{} frames)",
            file_path.display(),
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            metadata.codec,
            metadata.frame_count,
        );

        Ok(Self {
            input_context,
            decoder,
            scaler: None,
            video_stream_index,
            time_base,
            layout,
            metadata,
            decoded_frame: VideoFrame::empty(),
            converted_frame: VideoFrame::empty(),
            eof_sent: false,
            status: SourceStatus::Reading,
            file_path,
        })
    }

    /// Convert the current `decoded_frame` to the configured layout.
    fn convert_decoded_frame(&mut self) -> Result<Frame, UpscaleError> {
        let key = (
            self.decoded_frame.format(),
            self.decoded_frame.width(),
            self.decoded_frame.height(),
        );

        // The scaler is rebuilt only when the decoded geometry changes.
        if self
            .scaler
            .as_ref()
            .is_none_or(|(_, current)| *current != key)
        {
            let (format, width, height) = key;
            let scaler = ScalingContext::get(
                format,
                width,
                height,
                layout_to_pixel(self.layout),
                width,
                height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| UpscaleError::DecodeError(format!("cannot create scaler: {error}")))?;
            self.scaler = Some((scaler, key));
        }
        let (scaler, _) = self
            .scaler
            .as_mut()
            .ok_or_else(|| UpscaleError::DecodeError("scaler unavailable".to_string()))?;

        scaler
            .run(&self.decoded_frame, &mut self.converted_frame)
            .map_err(|error| UpscaleError::DecodeError(format!("scaling failed: {error}")))?;

        let timestamp = self
            .decoded_frame
            .timestamp()
            .or_else(|| self.decoded_frame.pts())
            .map(|pts| pts_to_duration(pts, self.time_base));

        let frame = video_frame_to_frame(&self.converted_frame, self.layout).ok_or_else(|| {
            UpscaleError::DecodeError(
                "Failed to construct frame from converted pixel data".to_string(),
            )
        })?;
        Ok(frame.with_timestamp(timestamp))
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    fn status(&self) -> SourceStatus {
        self.status
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, UpscaleError> {
        if self.status != SourceStatus::Reading {
            return Ok(None);
        }

        loop {
            // Drain frames the decoder already produced before feeding more.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return self.convert_decoded_frame().map(Some);
            }

            if self.eof_sent {
                self.status = SourceStatus::Completed;
                log::debug!("Video source exhausted: {}", self.file_path.display());
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        return Err(UpscaleError::DecodeError(format!(
                            "corrupt packet at pts {:?}: {error}",
                            packet.pts()
                        )));
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        self.status = SourceStatus::Failed;
                        return Err(UpscaleError::DecodeError(format!(
                            "failed to flush decoder: {error}"
                        )));
                    }
                    self.eof_sent = true;
                }
                Err(FfmpegError::Other { errno }) if errno == EAGAIN => {}
                Err(error) => {
                    self.status = SourceStatus::Failed;
                    return Err(UpscaleError::DecodeError(format!(
                        "demuxer read failed: {error}"
                    )));
                }
            }
        }
    }
}
