//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for inputs that
//! cannot be upscaled.

use std::error::Error;
use std::path::Path;

use videoboost::{
    FfmpegSink, FfmpegSource, FrameRate, PixelLayout, ResampleProvider, SinkSettings, TensorShape,
    UpscaleError, UpscaleOptions, VideoCodec, VideoUpscaler,
};

#[test]
fn open_nonexistent_file() {
    let result = FfmpegSource::open("this_file_does_not_exist.mp4", PixelLayout::Bgra);

    match result {
        Err(UpscaleError::FileOpen { path, .. }) => {
            assert_eq!(path, Path::new("this_file_does_not_exist.mp4"));
        }
        other => panic!("Expected FileOpen, got {other:?}"),
    }
}

#[test]
fn open_invalid_file() {
    // Create a temporary file with garbage content.
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegSource::open(&invalid_file_path, PixelLayout::Bgra);
    assert!(
        matches!(result, Err(UpscaleError::FileOpen { .. })),
        "Expected FileOpen for invalid media file"
    );
}

#[test]
fn upscale_missing_input_creates_no_output() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("out.mp4");
    let provider = ResampleProvider::new(TensorShape::image(3, 16, 16), 1).unwrap();
    let upscaler =
        VideoUpscaler::with_options(provider, UpscaleOptions::new().with_output_path(&output));

    let result = upscaler.upscale_blocking("this_file_does_not_exist.mp4");
    assert!(matches!(result, Err(UpscaleError::FileOpen { .. })));
    assert!(!output.exists());
    assert!(!upscaler.is_running());
}

/// Write a short mono 16-bit PCM WAV file: a container with audio only.
fn write_audio_only_file(path: &Path) {
    const SAMPLE_RATE: u32 = 8_000;
    let samples = vec![0u8; 1_600 * 2];

    let mut wav = Vec::with_capacity(44 + samples.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    wav.extend_from_slice(&samples);
    std::fs::write(path, wav).expect("Failed to write WAV file");
}

#[test]
fn audio_only_input_has_no_video_track() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = temporary_directory.path().join("tone.wav");
    write_audio_only_file(&input);

    let result = FfmpegSource::open(&input, PixelLayout::Bgra);
    assert!(
        matches!(result, Err(UpscaleError::NoVideoTrack)),
        "Expected NoVideoTrack, got {:?}",
        result.err()
    );
}

#[test]
fn upscale_audio_only_input_creates_no_output() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = temporary_directory.path().join("tone.wav");
    let output = temporary_directory.path().join("tone_x4.mp4");
    write_audio_only_file(&input);

    let provider = ResampleProvider::new(TensorShape::image(3, 16, 16), 1).unwrap();
    let upscaler =
        VideoUpscaler::with_options(provider, UpscaleOptions::new().with_output_path(&output));

    let result = upscaler.upscale_blocking(&input);
    assert!(matches!(result, Err(UpscaleError::NoVideoTrack)));
    assert!(!output.exists());
    assert!(!upscaler.is_running());
}

#[test]
fn sink_rejects_odd_dimensions() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let settings = SinkSettings::new(
        temporary_directory.path().join("odd.mp4"),
        VideoCodec::Mpeg4,
        33,
        32,
        FrameRate::default(),
    );
    let result = FfmpegSink::open(&settings);
    assert!(matches!(result, Err(UpscaleError::EncodeError(_))));
}

#[test]
fn frame_failures_classify_as_per_frame() {
    assert!(UpscaleError::DecodeError("x".into()).is_per_frame());
    assert!(UpscaleError::PackError("x".into()).is_per_frame());
    assert!(UpscaleError::InferError("x".into()).is_per_frame());
    assert!(UpscaleError::UnpackError("x".into()).is_per_frame());
    assert!(UpscaleError::EncodeError("x".into()).is_per_frame());

    assert!(!UpscaleError::NoVideoTrack.is_per_frame());
    assert!(!UpscaleError::FinalizeError("x".into()).is_per_frame());
    assert!(!UpscaleError::MuxError("x".into()).is_per_frame());
    assert!(!UpscaleError::Cancelled.is_per_frame());
    assert!(!UpscaleError::ModelUnavailable("x".into()).is_per_frame());
}

#[test]
fn frame_failed_exposes_its_cause() {
    let error = UpscaleError::FrameFailed {
        frame_index: 7,
        source: Box::new(UpscaleError::InferError("model rejected frame".into())),
    };
    let message = error.to_string();
    assert!(message.contains("Frame 7"), "{message}");
    assert!(message.contains("model rejected frame"), "{message}");

    let cause = error.source().expect("source");
    assert!(cause.to_string().starts_with("Inference failed"));
}

#[test]
fn ffmpeg_errors_convert() {
    let error: UpscaleError = ffmpeg_next::Error::Eof.into();
    assert!(matches!(error, UpscaleError::FfmpegError(_)));
}
