//! Awaitable upscale invocations.
//!
//! [`UpscaleFuture`] runs a whole invocation on Tokio's blocking pool, so
//! CPU-heavy decoding, inference, and encoding never stall the async
//! runtime.
//!
//! # Example
//!
//! ```no_run
//! use videoboost::{ResampleProvider, TensorShape, UpscaleError, VideoUpscaler};
//!
//! # async fn example() -> Result<(), UpscaleError> {
//! let provider = ResampleProvider::new(TensorShape::image(3, 256, 256), 4)?;
//! let upscaler = VideoUpscaler::new(provider);
//! let report = upscaler.upscale_async("input.mp4")?.await?;
//! println!("{} frames written", report.stats.frames_written);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::UpscaleError;
use crate::pipeline::UpscaleReport;

/// Resolves to the report of a background invocation.
///
/// If the blocking task panics or is aborted the future resolves to
/// [`UpscaleError::Cancelled`].
#[derive(Debug)]
pub struct UpscaleFuture {
    handle: JoinHandle<Result<UpscaleReport, UpscaleError>>,
}

impl Future for UpscaleFuture {
    type Output = Result<UpscaleReport, UpscaleError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.unwrap_or_else(|_| Err(UpscaleError::Cancelled)))
    }
}

pub(crate) fn spawn_upscale<F>(job: F) -> UpscaleFuture
where
    F: FnOnce() -> Result<UpscaleReport, UpscaleError> + Send + 'static,
{
    UpscaleFuture {
        handle: tokio::task::spawn_blocking(job),
    }
}
