//! Core types for the halo-stencil engine.
//!
//! This module contains the pieces every worker shares:
//! - Image descriptors and the RGBA8 layout
//! - Row partitioning and worker topology
//! - Halo-padded tiles and convolution kernels
//! - The broadcast job record and command-line options
//! - Error types

pub mod codec;
pub mod config;
pub mod error;
pub mod kernel;
pub mod options;
pub mod partition;
pub mod tile;
pub mod topology;
pub mod types;

// Re-export commonly used types
pub use codec::{FileCodec, ImageCodec};
pub use config::JobConfig;
pub use error::{AllocationError, ConfigError, IoError, StencilError, TransportError};
pub use kernel::Kernel;
pub use options::JobOptions;
pub use partition::{PartitionPlan, RowSpan};
pub use tile::Tile;
pub use topology::{Direction, Role, WorkerTopology, COORDINATOR};
pub use types::{ImageDescriptor, Origin, PixelFormat};
