//! Execution module.
//!
//! This module runs stencil jobs: the per-worker program, its iteration loop
//! and halo exchange, and the engine that starts the worker group.

pub mod controller;
pub mod engine;
pub mod exchange;
pub mod job;
pub mod progress;
pub mod worker;

pub use controller::{IterationController, Phase, WorkerStats};
pub use engine::{EngineOptions, JobOutput, JobStats, StencilEngine};
pub use exchange::{exchange_direction, exchange_halos};
pub use job::{load_catalog, run_job};
pub use progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
pub use worker::{run_worker, WorkerOutput};
