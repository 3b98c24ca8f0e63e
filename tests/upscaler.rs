//! `VideoUpscaler` concurrency tests.
//!
//! None of these need fixtures: the invocations fail on a missing input,
//! which is enough to observe scheduling and completion behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use videoboost::{
    InferenceProvider, ResampleProvider, Tensor, TensorShape, UpscaleError, VideoUpscaler,
};

/// Identity provider that blocks in `input_shape` until released once.
struct GatedProvider {
    inner: ResampleProvider,
    gate: Mutex<Option<Receiver<()>>>,
}

impl GatedProvider {
    fn new() -> (Self, mpsc::Sender<()>) {
        let (release, gate) = mpsc::channel();
        let provider = Self {
            inner: ResampleProvider::new(TensorShape::image(3, 8, 8), 1).unwrap(),
            gate: Mutex::new(Some(gate)),
        };
        (provider, release)
    }
}

impl InferenceProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    fn input_shape(&self) -> TensorShape {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.recv().ok();
        }
        self.inner.input_shape()
    }

    fn output_shape(&self) -> TensorShape {
        self.inner.output_shape()
    }

    fn infer(&mut self, input: &Tensor) -> Result<Tensor, UpscaleError> {
        self.inner.infer(input)
    }
}

#[test]
fn second_upscale_while_running_is_rejected() {
    let (provider, release) = GatedProvider::new();
    let upscaler = VideoUpscaler::new(provider);
    let completions = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&completions);
    let (sender, receiver) = mpsc::channel();
    let job = upscaler
        .upscale("missing_input.mp4", move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            sender.send(result).ok();
        })
        .expect("first upscale starts");
    assert!(upscaler.is_running());

    let rejected_completions = Arc::clone(&completions);
    let second = upscaler.upscale("other.mp4", move |_| {
        rejected_completions.fetch_add(100, Ordering::SeqCst);
    });
    assert!(matches!(second, Err(UpscaleError::AlreadyRunning)));
    assert!(matches!(
        upscaler.upscale_blocking("other.mp4"),
        Err(UpscaleError::AlreadyRunning)
    ));

    release.send(()).expect("release gate");
    job.join().expect("join");

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    let result = receiver.recv().expect("completion result");
    assert!(matches!(result, Err(UpscaleError::FileOpen { .. })));
    assert!(!upscaler.is_running());
}

#[test]
fn upscaler_is_reusable_after_failure() {
    let provider = ResampleProvider::new(TensorShape::image(3, 8, 8), 1).unwrap();
    let upscaler = VideoUpscaler::new(provider);

    for _ in 0..2 {
        let (sender, receiver) = mpsc::channel();
        let job = upscaler
            .upscale("missing_input.mp4", move |result| {
                sender.send(result).ok();
            })
            .expect("upscale starts");
        job.join().expect("join");
        assert!(matches!(receiver.recv(), Ok(Err(UpscaleError::FileOpen { .. }))));
    }
}

#[test]
fn debug_output_shows_state() {
    let provider = ResampleProvider::new(TensorShape::image(3, 8, 8), 1).unwrap();
    let upscaler = VideoUpscaler::new(provider);
    let debug = format!("{upscaler:?}");
    assert!(debug.contains("VideoUpscaler"));
    assert!(debug.contains("running: false"));
}

#[cfg(feature = "async")]
mod asynchronous {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn upscale_async_reports_failure() {
        let provider = ResampleProvider::new(TensorShape::image(3, 8, 8), 1).unwrap();
        let upscaler = VideoUpscaler::new(provider);

        let result = upscaler
            .upscale_async("missing_input.mp4")
            .expect("upscale starts")
            .await;
        assert!(matches!(result, Err(UpscaleError::FileOpen { .. })));
        assert!(!upscaler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upscale_async_rejects_concurrent_calls() {
        let (provider, release) = GatedProvider::new();
        let upscaler = VideoUpscaler::new(provider);

        let first = upscaler.upscale_async("missing_input.mp4").expect("first starts");
        assert!(matches!(
            upscaler.upscale_async("other.mp4"),
            Err(UpscaleError::AlreadyRunning)
        ));

        release.send(()).expect("release gate");
        assert!(first.await.is_err());
    }
}
