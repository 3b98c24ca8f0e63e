//! End-to-end tests through FFmpeg.
//!
//! A synthetic clip is written with `FfmpegSink`, upscaled, and decoded
//! again. Skipped when the MPEG-4 encoder is unavailable on this platform.

use std::path::Path;
use std::sync::mpsc;

use videoboost::{
    FailurePolicy, FfmpegSink, FfmpegSource, Frame, FrameRate, FrameSink, FrameSource,
    PixelLayout, ResampleProvider, SinkSettings, SourceStatus, TensorShape, UpscaleOptions,
    VideoCodec, VideoUpscaler,
};

const CLIP_FRAMES: u64 = 6;

fn clip_colour(index: u64) -> [u8; 4] {
    [(index * 40) as u8, 128, 255 - (index * 40) as u8, 255]
}

/// Write a small MPEG-4 clip, or return `false` if no encoder is available.
fn write_clip(path: &Path, width: u32, height: u32, rate: FrameRate) -> bool {
    let settings = SinkSettings::new(path, VideoCodec::Mpeg4, width, height, rate);
    let mut sink = match FfmpegSink::open(&settings) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Skipping: MPEG-4 encoder not available ({e})");
            return false;
        }
    };
    for index in 0..CLIP_FRAMES {
        let frame = Frame::filled(width, height, PixelLayout::Bgra, clip_colour(index));
        sink.append(&frame, rate.timestamp(index)).expect("append");
    }
    assert_eq!(sink.frames_written(), CLIP_FRAMES);
    sink.finish().expect("finish");
    true
}

fn decode_all(path: &Path) -> (FfmpegSource, Vec<Frame>) {
    let mut source = FfmpegSource::open(path, PixelLayout::Bgra).expect("open");
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame().expect("decode") {
        frames.push(frame);
    }
    (source, frames)
}

fn close_to(actual: [u8; 4], expected: [u8; 4]) -> bool {
    actual
        .iter()
        .zip(expected)
        .take(3)
        .all(|(&a, e)| a.abs_diff(e) <= 24)
}

#[test]
fn sink_output_decodes_back() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let clip = directory.path().join("clip.mp4");
    let rate = FrameRate::from_integer(10).unwrap();
    if !write_clip(&clip, 32, 24, rate) {
        return;
    }

    let (source, frames) = decode_all(&clip);
    assert_eq!(source.status(), SourceStatus::Completed);
    let metadata = source.metadata();
    assert_eq!((metadata.width, metadata.height), (32, 24));
    assert!((metadata.frame_rate.as_f64() - 10.0).abs() < 0.01);

    assert_eq!(frames.len() as u64, CLIP_FRAMES);
    assert!(close_to(frames[0].pixel_rgba(16, 12), clip_colour(0)));
    assert!(close_to(frames[5].pixel_rgba(16, 12), clip_colour(5)));

    let timestamps: Vec<_> = frames.iter().filter_map(Frame::timestamp).collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn upscale_file_end_to_end() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let clip = directory.path().join("clip.mp4");
    let output = directory.path().join("clip_x2.mp4");
    let rate = FrameRate::from_integer(10).unwrap();
    if !write_clip(&clip, 32, 24, rate) {
        return;
    }

    let provider = ResampleProvider::new(TensorShape::image(3, 24, 32), 2).unwrap();
    let options = UpscaleOptions::new()
        .with_scale_factor(2)
        .with_codec(VideoCodec::Mpeg4)
        .with_output_path(&output)
        .with_failure_policy(FailurePolicy::Abort);
    let upscaler = VideoUpscaler::with_options(provider, options);

    let report = upscaler.upscale_blocking(&clip).expect("upscale");
    assert_eq!(report.output, output);
    assert_eq!((report.width, report.height), (64, 48));
    assert_eq!(report.stats.frames_read, CLIP_FRAMES);
    assert_eq!(report.stats.frames_written, CLIP_FRAMES);

    let (source, frames) = decode_all(&output);
    let metadata = source.metadata();
    assert_eq!((metadata.width, metadata.height), (64, 48));
    assert!((metadata.frame_rate.as_f64() - 10.0).abs() < 0.01);
    assert_eq!(frames.len() as u64, CLIP_FRAMES);
    assert!(close_to(frames[2].pixel_rgba(40, 30), clip_colour(2)));
}

#[test]
fn background_upscale_calls_completion_once() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let clip = directory.path().join("clip.mp4");
    let output = directory.path().join("background.mp4");
    let rate = FrameRate::from_integer(10).unwrap();
    if !write_clip(&clip, 32, 24, rate) {
        return;
    }

    let provider = ResampleProvider::new(TensorShape::image(3, 64, 64), 1).unwrap();
    let options = UpscaleOptions::new()
        .with_codec(VideoCodec::Mpeg4)
        .with_output_path(&output);
    let upscaler = VideoUpscaler::with_options(provider, options);

    let (sender, receiver) = mpsc::channel();
    let job = upscaler
        .upscale(clip.clone(), move |result| {
            sender.send(result).expect("send");
        })
        .expect("start");
    job.join().expect("join");

    let results: Vec<_> = receiver.try_iter().collect();
    assert_eq!(results.len(), 1, "completion must run exactly once");
    let path = results[0].as_ref().expect("upscale");
    assert_eq!(path, &output);

    let (_, frames) = decode_all(&output);
    assert_eq!(frames.len() as u64, CLIP_FRAMES);
    assert_eq!((frames[0].width(), frames[0].height()), (128, 96));
    assert!(!upscaler.is_running());
}
