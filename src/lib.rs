//! # halo-stencil - Distributed iterative image convolution
//!
//! halo-stencil applies a small weighted kernel to an RGBA image many times
//! over. The image is split into horizontal row slices, one per worker; each
//! iteration the workers trade their boundary rows with their row neighbors
//! (the "halo"), convolve their own slice, and meet at a barrier. The
//! coordinator (rank 0) loads, distributes, collects and saves the image.
//!
//! ## Features
//!
//! - **Row partitioning**: near-equal slices, remainder rows go to the first workers
//! - **Deadlock-free halo exchange**: role and parity ordering of combined send/receive
//! - **Transport abstraction**: every collective goes through the [`Communicator`] trait
//! - **Parallel kernels**: rows of a slice are computed with rayon
//! - **Kernel catalog**: built-in kernels plus user kernels from TOML files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use halo_stencil::prelude::*;
//!
//! let catalog = KernelCatalog::with_builtins();
//! let kernel = catalog.lookup("gauss3")?.clone();
//!
//! let image = FileCodec::new().load("input.png".as_ref())?;
//! let job = JobConfig::new(ImageDescriptor::of(&image), kernel, 10);
//!
//! let engine = StencilEngine::with_options(EngineOptions::new().with_workers(4));
//! let output = engine.run(&job, &image)?;
//! FileCodec::new().save("output.png".as_ref(), &output.image)?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: image descriptors, partitioning, tiles, kernels, job records, errors
//! - [`comm`]: the [`Communicator`] trait and the in-process worker group
//! - [`execution`]: halo exchange, the iteration loop, workers and the engine
//! - [`filters`]: the kernel catalog and built-in kernels
//!
//! [`Communicator`]: comm::Communicator

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comm;
pub mod core;
pub mod execution;
pub mod filters;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use halo_stencil::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::codec::{FileCodec, ImageCodec};
    pub use crate::core::config::JobConfig;
    pub use crate::core::kernel::Kernel;
    pub use crate::core::options::JobOptions;
    pub use crate::core::partition::{PartitionPlan, RowSpan};
    pub use crate::core::tile::Tile;
    pub use crate::core::topology::{Direction, Role, WorkerTopology, COORDINATOR};
    pub use crate::core::types::{ImageDescriptor, Origin, PixelFormat};

    // Errors
    pub use crate::core::error::{
        AllocationError, ConfigError, IoError, StencilError, StencilResult, TransportError,
    };

    // Communication
    pub use crate::comm::{AbortHandle, Communicator, LocalCluster, LocalComm};

    // Execution
    pub use crate::execution::controller::{IterationController, Phase, WorkerStats};
    pub use crate::execution::engine::{EngineOptions, JobOutput, JobStats, StencilEngine};
    pub use crate::execution::job::run_job;
    pub use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
    pub use crate::execution::worker::{run_worker, WorkerOutput};

    // Kernels
    pub use crate::filters::catalog::{CatalogEntry, KernelCatalog};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
