//! Progress reporting and cancellation support.
//!
//! [`ProgressCallback`] observes an upscale invocation frame by frame,
//! [`CancellationToken`] stops it cooperatively, and [`ProgressInfo`] is the
//! snapshot handed to the callback.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use videoboost::{ProgressCallback, ProgressInfo, UpscaleOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% ({} dropped)", info.frames_dropped);
//!         }
//!     }
//! }
//!
//! let options = UpscaleOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// A snapshot of upscale progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames pulled from the source so far.
    pub frames_read: u64,
    /// Frames appended to the sink so far.
    pub frames_written: u64,
    /// Frames dropped after a per-frame failure.
    pub frames_dropped: u64,
    /// Estimated input frame count, if the container reported a duration.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the pipeline started reading.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Presentation time of the most recently written frame.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates during an upscale.
///
/// Implementations must be [`Send`] and [`Sync`]: the pipeline runs on a
/// worker thread. Callbacks observe but cannot halt the operation; use
/// [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` processed frames and once at the end.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. Used when no callback is set.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state: cancelling any clone cancels them all.
///
/// # Example
///
/// ```
/// use videoboost::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.clone().cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks pipeline timing and emits batched callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    batch_size: u64,
    start_time: Instant,
    since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: Option<u64>, batch_size: u64) -> Self {
        Self {
            callback,
            total,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            since_last_report: 0,
        }
    }

    /// Record one processed input frame; report when the batch fills up.
    pub(crate) fn advance(&mut self, counters: Counters, timestamp: Option<Duration>) {
        self.since_last_report += 1;
        if self.since_last_report >= self.batch_size {
            self.report(counters, timestamp);
            self.since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self, counters: Counters) {
        self.report(counters, None);
    }

    fn report(&self, counters: Counters, timestamp: Option<Duration>) {
        let elapsed = self.start_time.elapsed();
        let done = counters.read;

        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (done.min(total) as f32 / total as f32) * 100.0);

        let estimated_remaining = if done > 0 {
            self.total.map(|total| {
                let remaining = total.saturating_sub(done);
                elapsed.mul_f64(remaining as f64 / done as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            frames_read: counters.read,
            frames_written: counters.written,
            frames_dropped: counters.dropped,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_timestamp: timestamp,
        });
    }
}

/// Counter snapshot passed to the tracker.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub(crate) read: u64,
    pub(crate) written: u64,
    pub(crate) dropped: u64,
}
