//! Frame sinks: encode upscaled frames into an output container.
//!
//! [`FrameSink`] is the append-only contract the pipeline drives;
//! [`FfmpegSink`] implements it with an FFmpeg encoder and muxer. Output
//! dimensions are fixed when the sink is opened. Frames of any other size
//! are rescaled to them, so the container geometry never changes.
//!
//! # Example
//!
//! ```no_run
//! use videoboost::{FfmpegSink, Frame, FrameRate, FrameSink, PixelLayout, SinkSettings, VideoCodec};
//!
//! let rate = FrameRate::from_integer(24).unwrap();
//! let settings = SinkSettings::new("out.mp4", VideoCodec::H264, 256, 256, rate);
//! let mut sink = FfmpegSink::open(&settings)?;
//! for index in 0..24 {
//!     let frame = Frame::filled(256, 256, PixelLayout::Bgra, [255, 0, 0, 255]);
//!     sink.append(&frame, rate.timestamp(index))?;
//! }
//! let path = sink.finish()?;
//! # Ok::<(), videoboost::UpscaleError>(())
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::encoder::video::Encoder as VideoEncoder;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Dictionary, Error as FfmpegError, Packet, Rational, Rescale};

use crate::conversion::{
    frame_rate_time_base, frame_rate_to_rational, frame_to_video_frame, layout_to_pixel,
};
use crate::error::UpscaleError;
use crate::frame::{Frame, FrameRate, Timestamp};

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// H.264 / AVC. This is the default.
    #[default]
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2. Built into every FFmpeg, handy when x264 is missing.
    Mpeg4,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }

    /// Whether the encoder understands a `crf` option.
    fn supports_crf(self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H265)
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }
}

impl Display for VideoCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Everything a sink needs to know before the first frame arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    /// Output container path; the format is inferred from the extension.
    pub output: PathBuf,
    /// Output codec.
    pub codec: VideoCodec,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Nominal frame rate of the output track.
    pub frame_rate: FrameRate,
    /// Constant Rate Factor, for codecs that support it.
    pub crf: Option<u32>,
    /// Target bitrate in bits per second. Overrides CRF.
    pub bitrate: Option<usize>,
}

impl SinkSettings {
    /// Settings without CRF or bitrate overrides.
    pub fn new<P: Into<PathBuf>>(
        output: P,
        codec: VideoCodec,
        width: u32,
        height: u32,
        frame_rate: FrameRate,
    ) -> Self {
        Self {
            output: output.into(),
            codec,
            width,
            height,
            frame_rate,
            crf: None,
            bitrate: None,
        }
    }
}

/// An append-only consumer of upscaled frames.
pub trait FrameSink {
    /// Encode `frame` at `timestamp`.
    ///
    /// Timestamps must strictly increase across calls. A per-frame error
    /// means the frame was not accepted and `timestamp` is still free;
    /// any other error leaves the container unusable.
    fn append(&mut self, frame: &Frame, timestamp: Timestamp) -> Result<(), UpscaleError>;

    /// Flush and close the container, returning its location.
    fn finish(self) -> Result<PathBuf, UpscaleError>
    where
        Self: Sized;
}

/// FFmpeg-backed [`FrameSink`] writing a single video track.
pub struct FfmpegSink {
    output: Output,
    encoder: VideoEncoder,
    scaler: Option<(ScalingContext, (Pixel, u32, u32))>,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    last_pts: Option<i64>,
    frames_written: u64,
    settings: SinkSettings,
}

impl Debug for FfmpegSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegSink")
            .field("settings", &self.settings)
            .field("stream_index", &self.stream_index)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

/// YUV 4:2:0 is what every supported encoder accepts.
const ENCODER_PIXEL_FORMAT: Pixel = Pixel::YUV420P;

impl FfmpegSink {
    /// Create the container, configure the encoder and write the header.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::EncodeError`] if the dimensions are zero or
    /// odd, the codec is unavailable, or the container cannot be created.
    pub fn open(settings: &SinkSettings) -> Result<Self, UpscaleError> {
        let SinkSettings {
            output: path,
            codec,
            width,
            height,
            frame_rate,
            ..
        } = settings;
        let (width, height) = (*width, *height);

        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(UpscaleError::EncodeError(format!(
                "output dimensions {width}x{height} must be non-zero and even"
            )));
        }

        ffmpeg_next::init()
            .map_err(|e| UpscaleError::EncodeError(format!("FFmpeg initialisation failed: {e}")))?;

        let mut output = ffmpeg_next::format::output(path).map_err(|e| {
            UpscaleError::EncodeError(format!("cannot open output {}: {e}", path.display()))
        })?;

        // Checked before add_stream to avoid holding two borrows of `output`.
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec_id = codec.to_codec_id();
        let encoder_codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            UpscaleError::EncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|e| UpscaleError::EncodeError(format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.encoder().video())
            .map_err(|e| UpscaleError::EncodeError(format!("cannot create video encoder: {e}")))?;

        let encoder_time_base = frame_rate_time_base(*frame_rate);
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(ENCODER_PIXEL_FORMAT);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(frame_rate_to_rational(*frame_rate)));

        let mut options = Dictionary::new();
        if let Some(bitrate) = settings.bitrate {
            encoder.set_bit_rate(bitrate);
        } else if let Some(crf) = settings.crf
            && codec.supports_crf()
        {
            options.set("crf", &crf.to_string());
        }

        if needs_global_header {
            // SAFETY: the encoder context is valid and not yet opened.
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let opened_encoder = encoder
            .open_as_with(encoder_codec, options)
            .map_err(|e| UpscaleError::EncodeError(format!("cannot open encoder: {e}")))?;

        stream.set_parameters(&opened_encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .map_err(|e| UpscaleError::EncodeError(format!("cannot write header: {e}")))?;

        // The muxer may pick its own time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(encoder_time_base);

        log::info!(
            "Opened video sink: {} ({}x{}, codec={}, {} fps)",
            path.display(),
            width,
            height,
            codec,
            frame_rate,
        );

        Ok(Self {
            output,
            encoder: opened_encoder,
            scaler: None,
            stream_index,
            encoder_time_base,
            stream_time_base,
            last_pts: None,
            frames_written: 0,
            settings: settings.clone(),
        })
    }

    /// Where the container is being written.
    pub fn output_path(&self) -> &Path {
        &self.settings.output
    }

    /// Number of frames accepted so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Convert `frame` to the encoder's format and size.
    fn to_encoder_frame(&mut self, frame: &Frame) -> Result<VideoFrame, UpscaleError> {
        let key = (layout_to_pixel(frame.layout()), frame.width(), frame.height());
        if self
            .scaler
            .as_ref()
            .is_none_or(|(_, current)| *current != key)
        {
            if (frame.width(), frame.height()) != (self.settings.width, self.settings.height) {
                log::debug!(
                    "Rescaling {}x{} frames to {}x{}",
                    frame.width(),
                    frame.height(),
                    self.settings.width,
                    self.settings.height,
                );
            }
            let scaler = ScalingContext::get(
                key.0,
                key.1,
                key.2,
                ENCODER_PIXEL_FORMAT,
                self.settings.width,
                self.settings.height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|e| UpscaleError::EncodeError(format!("cannot create scaler: {e}")))?;
            self.scaler = Some((scaler, key));
        }
        let (scaler, _) = self
            .scaler
            .as_mut()
            .ok_or_else(|| UpscaleError::EncodeError("scaler unavailable".to_string()))?;

        let source = frame_to_video_frame(frame);
        let mut converted = VideoFrame::empty();
        scaler
            .run(&source, &mut converted)
            .map_err(|e| UpscaleError::EncodeError(format!("scaling failed: {e}")))?;
        Ok(converted)
    }

    /// Move every packet the encoder has ready into the container.
    fn write_pending_packets(&mut self) -> Result<(), FfmpegError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet.write_interleaved(&mut self.output)?;
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn append(&mut self, frame: &Frame, timestamp: Timestamp) -> Result<(), UpscaleError> {
        let pts = timestamp
            .ticks()
            .rescale(frame_rate_time_base(timestamp.frame_rate()), self.encoder_time_base);
        if let Some(last) = self.last_pts
            && pts <= last
        {
            return Err(UpscaleError::EncodeError(format!(
                "timestamp {pts} does not follow {last}"
            )));
        }

        let mut encoder_frame = self.to_encoder_frame(frame)?;
        encoder_frame.set_pts(Some(pts));

        self.encoder
            .send_frame(&encoder_frame)
            .map_err(|e| UpscaleError::EncodeError(format!("send_frame failed: {e}")))?;
        // The encoder owns the frame from here on, so its pts is taken.
        self.last_pts = Some(pts);
        self.frames_written += 1;

        self.write_pending_packets()
            .map_err(|e| UpscaleError::MuxError(format!("write packet failed: {e}")))
    }

    fn finish(mut self) -> Result<PathBuf, UpscaleError> {
        self.encoder
            .send_eof()
            .map_err(|e| UpscaleError::FinalizeError(format!("send_eof failed: {e}")))?;
        self.write_pending_packets()
            .map_err(|e| UpscaleError::FinalizeError(format!("write flush packet failed: {e}")))?;
        self.output
            .write_trailer()
            .map_err(|e| UpscaleError::FinalizeError(format!("cannot write trailer: {e}")))?;

        log::info!(
            "Finalized {} ({} frames)",
            self.settings.output.display(),
            self.frames_written,
        );
        Ok(self.settings.output)
    }
}
