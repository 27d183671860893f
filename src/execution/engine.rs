//! Execution engine implementation.
//!
//! The engine validates a job, starts one thread per worker over an
//! in-process group and collects the gathered image.

use crate::comm::{Communicator, LocalCluster};
use crate::core::config::JobConfig;
use crate::core::error::{StencilError, StencilResult, TransportError};
use crate::execution::controller::WorkerStats;
use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::execution::worker::{run_worker, WorkerOutput};
use image::RgbaImage;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Engine options.
#[derive(Clone)]
pub struct EngineOptions {
    /// Number of workers (`None` = available parallelism, capped so every
    /// worker owns at least a kernel radius of rows).
    pub workers: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name: String,
    /// Progress callback.
    pub progress_callback: Option<Arc<ProgressCallback>>,
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("workers", &self.workers)
            .field("thread_name", &self.thread_name)
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: None,
            thread_name: "stencil-worker".to_string(),
            progress_callback: None,
        }
    }
}

impl EngineOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Worker count for an image of `height` rows and a kernel of `radius`.
    ///
    /// An explicit count is returned as-is. The default never splits the
    /// image so finely that a worker owns fewer than `radius` rows.
    pub fn resolve_workers(&self, height: usize, radius: usize) -> usize {
        let available = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.workers
            .unwrap_or_else(|| default_workers(available, height, radius))
    }
}

fn default_workers(available: usize, height: usize, radius: usize) -> usize {
    available.min(height / radius.max(1)).max(1)
}

/// Job statistics.
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    /// Number of workers used.
    pub workers: usize,
    /// Iterations run.
    pub iterations: u32,
    /// Wall time from validation to the gathered image.
    pub total_duration: Duration,
    /// Per-worker counters, in rank order.
    pub per_worker: Vec<WorkerStats>,
}

impl JobStats {
    /// Total halo exchanges across the group.
    pub fn total_exchanges(&self) -> usize {
        self.per_worker.iter().map(|s| s.exchanges).sum()
    }

    /// Longest compute time of any worker.
    pub fn max_compute_time(&self) -> Duration {
        self.per_worker
            .iter()
            .map(|s| s.compute_time)
            .max()
            .unwrap_or_default()
    }
}

/// Result of running a job.
#[derive(Debug)]
pub struct JobOutput {
    /// The filtered image.
    pub image: RgbaImage,
    /// Execution statistics.
    pub stats: JobStats,
}

/// The execution engine.
#[derive(Debug, Clone, Default)]
pub struct StencilEngine {
    options: EngineOptions,
}

impl StencilEngine {
    /// Create a new engine with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given options.
    pub fn with_options(options: EngineOptions) -> Self {
        Self { options }
    }

    /// The engine's options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Filter `image` with `job`.
    ///
    /// Configuration errors are reported before any worker starts. If a
    /// worker fails, the group is aborted and the error that caused the
    /// failure is returned, not the transport errors it triggered in the
    /// other workers.
    pub fn run(&self, job: &JobConfig, image: &RgbaImage) -> StencilResult<JobOutput> {
        let start_time = Instant::now();
        let workers = self.options
            .resolve_workers(job.image.height, job.kernel.radius());

        job.plan(workers)?;
        job.image.check(image)?;
        let comms = LocalCluster::create(workers)?;
        let abort = comms[0].abort_handle();

        let tracker = ProgressTracker::new(workers, job.iterations)
            .with_callback(self.options.progress_callback.clone());
        tracker.start();
        log::info!(
            "Filtering {} with a {}x{} kernel, {} iterations on {} workers",
            job.image,
            job.kernel.dim(),
            job.kernel.dim(),
            job.iterations,
            workers
        );

        let results: Vec<(usize, StencilResult<WorkerOutput>)> = thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            for comm in comms {
                let rank = comm.rank();
                let (job, input) = if comm.is_coordinator() {
                    (Some(job), Some(image))
                } else {
                    (None, None)
                };
                let tracker = &tracker;

                let spawned = thread::Builder::new()
                    .name(format!("{}-{}", self.options.thread_name, rank))
                    .spawn_scoped(s, move || {
                        let result = run_worker(&comm, job, input, Some(tracker));
                        if let Err(ref e) = result {
                            log::debug!("worker {}: {}", rank, e);
                            comm.abort();
                        }
                        result
                    });

                match spawned {
                    Ok(handle) => handles.push((rank, Ok(handle))),
                    Err(e) => {
                        abort.abort();
                        handles.push((rank, Err(e)));
                    }
                }
            }

            handles
                .into_iter()
                .map(|(rank, handle)| {
                    let result = match handle {
                        Ok(handle) => handle
                            .join()
                            .unwrap_or_else(|_| Err(TransportError::Panicked { rank }.into())),
                        Err(e) => Err(TransportError::Spawn {
                            rank,
                            error: e.to_string(),
                        }
                        .into()),
                    };
                    (rank, result)
                })
                .collect()
        });

        let mut outputs = Vec::with_capacity(workers);
        let mut errors = Vec::new();
        for (rank, result) in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => errors.push((rank, e)),
            }
        }

        if let Some((rank, error)) = root_cause(errors) {
            log::error!("Worker {} failed: {}", rank, error);
            tracker.report_error(rank, error.to_string());
            return Err(error);
        }

        let mut gathered = None;
        let mut per_worker = Vec::with_capacity(workers);
        for output in outputs {
            if output.image.is_some() {
                gathered = output.image;
            }
            per_worker.push(output.stats);
        }
        let image = gathered.ok_or(TransportError::MissingRootData("the gathered image"))?;

        tracker.complete();
        let stats = JobStats {
            workers,
            iterations: job.iterations,
            total_duration: start_time.elapsed(),
            per_worker,
        };
        log::info!(
            "Finished in {:?} ({} halo exchanges)",
            stats.total_duration,
            stats.total_exchanges()
        );

        Ok(JobOutput { image, stats })
    }
}

/// Pick the error to report from the failed workers, in rank order.
///
/// The first error that is not a consequence of another failure wins. If
/// every error is secondary, the lowest rank's error is reported.
fn root_cause(mut errors: Vec<(usize, StencilError)>) -> Option<(usize, StencilError)> {
    if errors.is_empty() {
        return None;
    }
    let primary = errors
        .iter()
        .position(|(_, e)| !e.is_secondary())
        .unwrap_or(0);
    let (rank, error) = errors.remove(primary);
    for (other, e) in &errors {
        log::debug!("worker {} (secondary): {}", other, e);
    }
    Some((rank, error))
}
