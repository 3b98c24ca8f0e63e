//! The high-level entry point.
//!
//! [`VideoUpscaler`] owns an [`InferenceProvider`] and a set of
//! [`UpscaleOptions`], and runs one invocation at a time against real files
//! through FFmpeg. Invocations can be started in the background with a
//! completion callback, run on the calling thread, or (with the `async`
//! feature) awaited as a future.
//!
//! # Example
//!
//! ```no_run
//! use videoboost::{ResampleProvider, TensorShape, UpscaleError, VideoUpscaler};
//!
//! # fn main() -> Result<(), UpscaleError> {
//! let provider = ResampleProvider::new(TensorShape::image(3, 256, 256), 4)?;
//! let upscaler = VideoUpscaler::new(provider);
//!
//! let job = upscaler.upscale("input.mp4", |result| match result {
//!     Ok(path) => println!("Wrote {}", path.display()),
//!     Err(error) => eprintln!("Upscale failed: {error}"),
//! })?;
//! job.join()?;
//! # Ok(())
//! # }
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{Builder as ThreadBuilder, JoinHandle};

use crate::configuration::UpscaleOptions;
use crate::error::UpscaleError;
use crate::inference::InferenceProvider;
use crate::pipeline::{Pipeline, UpscaleReport};
use crate::sink::FfmpegSink;
use crate::source::FfmpegSource;

/// Upscales video files through an [`InferenceProvider`].
///
/// Only one invocation may be in flight per upscaler; starting another
/// while one runs returns [`UpscaleError::AlreadyRunning`].
pub struct VideoUpscaler<P: InferenceProvider + 'static> {
    provider: Arc<Mutex<P>>,
    options: UpscaleOptions,
    busy: Arc<AtomicBool>,
}

impl<P: InferenceProvider + 'static> Debug for VideoUpscaler<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoUpscaler")
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<P: InferenceProvider + 'static> VideoUpscaler<P> {
    /// Create an upscaler with default options.
    pub fn new(provider: P) -> Self {
        Self::with_options(provider, UpscaleOptions::new())
    }

    /// Create an upscaler with the given options.
    pub fn with_options(provider: P, options: UpscaleOptions) -> Self {
        Self {
            provider: Arc::new(Mutex::new(provider)),
            options,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The options every invocation runs with.
    pub fn options(&self) -> &UpscaleOptions {
        &self.options
    }

    /// `true` while an invocation is in flight.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start upscaling `input` on a background thread.
    ///
    /// `completion` is called exactly once, from the worker thread, with the
    /// output path on success or the error that ended the invocation. The
    /// upscaler is available for a new invocation by the time `completion`
    /// runs.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::AlreadyRunning`] if an invocation is in
    /// flight, or [`UpscaleError::IoError`] if the worker thread cannot be
    /// spawned. In both cases `completion` is never called.
    pub fn upscale<I, F>(&self, input: I, completion: F) -> Result<UpscaleJob, UpscaleError>
    where
        I: Into<PathBuf>,
        F: FnOnce(Result<PathBuf, UpscaleError>) + Send + 'static,
    {
        let guard = BusyGuard::acquire(&self.busy)?;
        let input = input.into();
        let provider = Arc::clone(&self.provider);
        let options = self.options.clone();

        let handle = ThreadBuilder::new()
            .name("videoboost-upscale".to_string())
            .spawn(move || {
                let result = run_invocation(&provider, &options, &input);
                drop(guard);
                completion(result.map(|report| report.output));
            })?;

        Ok(UpscaleJob { handle })
    }

    /// Upscale `input` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::AlreadyRunning`] if an invocation is in
    /// flight, otherwise whatever ended the invocation.
    pub fn upscale_blocking<I: AsRef<Path>>(&self, input: I) -> Result<UpscaleReport, UpscaleError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        run_invocation(&self.provider, &self.options, input.as_ref())
    }

    /// Upscale `input` on Tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::AlreadyRunning`] if an invocation is in
    /// flight. Failures of the invocation itself are reported by the future.
    #[cfg(feature = "async")]
    pub fn upscale_async<I: Into<PathBuf>>(
        &self,
        input: I,
    ) -> Result<crate::future::UpscaleFuture, UpscaleError> {
        let guard = BusyGuard::acquire(&self.busy)?;
        let input = input.into();
        let provider = Arc::clone(&self.provider);
        let options = self.options.clone();

        Ok(crate::future::spawn_upscale(move || {
            let _guard = guard;
            run_invocation(&provider, &options, &input)
        }))
    }
}

/// Handle to a background invocation started with
/// [`VideoUpscaler::upscale`].
#[derive(Debug)]
pub struct UpscaleJob {
    handle: JoinHandle<()>,
}

impl UpscaleJob {
    /// `true` once the worker thread has exited, which is after the
    /// completion callback returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker thread exits.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Cancelled`] if the worker panicked.
    pub fn join(self) -> Result<(), UpscaleError> {
        self.handle.join().map_err(|_| UpscaleError::Cancelled)
    }
}

/// Marks the upscaler busy for as long as it lives, including across a
/// panicking worker.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, UpscaleError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| UpscaleError::AlreadyRunning)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn run_invocation<P: InferenceProvider>(
    provider: &Mutex<P>,
    options: &UpscaleOptions,
    input: &Path,
) -> Result<UpscaleReport, UpscaleError> {
    let output = options.resolve_output_path(input);
    log::info!("Upscaling {} into {}", input.display(), output.display());

    let mut provider = provider.lock().unwrap_or_else(PoisonError::into_inner);
    let mut pipeline = Pipeline::new(&mut *provider, options);
    pipeline.run(
        || FfmpegSource::open_with_fallback(input, options.decode_layout, options.fallback_frame_rate),
        FfmpegSink::open,
        &output,
    )
}
