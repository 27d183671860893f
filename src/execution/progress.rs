//! Progress tracking for a job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// The worker group has started.
    Started {
        workers: usize,
        iterations: u32,
    },
    /// All workers have passed the barrier of an iteration.
    IterationCompleted {
        iteration: u32,
        total: u32,
        duration_ms: u64,
    },
    /// Overall progress percentage.
    Progress {
        percent: f32,
        elapsed_ms: u64,
        estimated_remaining_ms: Option<u64>,
    },
    /// The image has been gathered.
    Completed {
        total_duration_ms: u64,
        iterations: u32,
    },
    /// A worker failed.
    Error {
        rank: usize,
        message: String,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks iteration progress and forwards it to an optional callback.
///
/// Only the coordinator reports iterations: the barrier at the end of each
/// iteration means every worker has finished it by then.
pub struct ProgressTracker {
    /// Number of workers in the group.
    workers: usize,
    /// Total number of iterations.
    total_iterations: u32,
    /// Number of iterations completed.
    completed: AtomicU64,
    /// Start time.
    start_time: Instant,
    /// Progress callback.
    callback: Option<Arc<ProgressCallback>>,
    /// Sum and count of iteration durations for estimation.
    iteration_times: parking_lot::Mutex<IterationTimes>,
}

#[derive(Debug, Default)]
struct IterationTimes {
    total_ms: u64,
    count: u64,
}

impl IterationTimes {
    fn record(&mut self, duration_ms: u64) {
        self.total_ms = self.total_ms.saturating_add(duration_ms);
        self.count += 1;
    }

    fn average_ms(&self) -> Option<u64> {
        (self.count > 0).then(|| self.total_ms / self.count)
    }
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(workers: usize, total_iterations: u32) -> Self {
        Self {
            workers,
            total_iterations,
            completed: AtomicU64::new(0),
            start_time: Instant::now(),
            callback: None,
            iteration_times: parking_lot::Mutex::new(IterationTimes::default()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: Option<Arc<ProgressCallback>>) -> Self {
        self.callback = callback;
        self
    }

    /// Report that the group has started.
    pub fn start(&self) {
        self.send_update(ProgressUpdate::Started {
            workers: self.workers,
            iterations: self.total_iterations,
        });
    }

    /// Report that an iteration has completed.
    pub fn iteration_completed(&self, duration_ms: u64) {
        let iteration = self.completed.fetch_add(1, Ordering::Relaxed) as u32 + 1;

        // Record time for estimation
        self.iteration_times.lock().record(duration_ms);

        self.send_update(ProgressUpdate::IterationCompleted {
            iteration,
            total: self.total_iterations,
            duration_ms,
        });
        self.send_progress_update();
    }

    /// Report a worker failure.
    pub fn report_error(&self, rank: usize, message: String) {
        self.send_update(ProgressUpdate::Error { rank, message });
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            iterations: self.completed_iterations(),
        });
    }

    /// Number of iterations reported so far.
    pub fn completed_iterations(&self) -> u32 {
        self.completed.load(Ordering::Relaxed) as u32
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_iterations == 0 {
            return 100.0;
        }
        let completed = self.completed.load(Ordering::Relaxed);
        (completed as f32 / self.total_iterations as f32) * 100.0
    }

    /// Estimate remaining time in milliseconds.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let avg_time = self.iteration_times.lock().average_ms()?;
        let remaining = (self.total_iterations as u64)
            .saturating_sub(self.completed.load(Ordering::Relaxed));

        Some(avg_time.saturating_mul(remaining))
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }

    fn send_progress_update(&self) {
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.elapsed_ms(),
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("workers", &self.workers)
            .field("total_iterations", &self.total_iterations)
            .field("completed", &self.completed_iterations())
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}
