//! Error types for halo-stencil.
//!
//! Uses thiserror for structured errors with context. Every error is fatal for
//! the job: the stencil iteration is barrier-synchronized, so there is no safe
//! way to continue once a single worker has failed.

use crate::comm::Tag;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for halo-stencil.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum StencilError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors in the job configuration, detected before any iteration begins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Image height {height} is smaller than the worker count {workers}")]
    TooFewRows { height: usize, workers: usize },

    #[error("Unknown kernel '{name}'")]
    UnknownKernel { name: String },

    #[error("Invalid kernel: {reason}")]
    InvalidKernel { reason: String },

    #[error("Kernel radius {radius} does not fit a {width}x{height} image")]
    KernelLargerThanImage {
        radius: usize,
        width: usize,
        height: usize,
    },

    #[error("Worker {worker} owns {rows} rows, fewer than the kernel radius {radius}")]
    HaloExceedsPartition {
        worker: usize,
        rows: usize,
        radius: usize,
    },

    #[error("Image buffer holds {got} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, got: usize },

    #[error("Image is {got_width}x{got_height}, job expects {width}x{height}")]
    ImageMismatch {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },

    #[error("Malformed job record: {0}")]
    MalformedRecord(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid value '{value}' for {argument}")]
    InvalidArgument { argument: String, value: String },

    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("Invalid kernel catalog: {0}")]
    InvalidCatalog(String),

    #[error("No job configuration on the coordinator")]
    MissingJob,
}

/// Errors while reading or writing files at the job boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IoError {
    #[error("Failed to load image '{}': {error}", path.display())]
    Load { path: PathBuf, error: String },

    #[error("Failed to save image '{}': {error}", path.display())]
    Save { path: PathBuf, error: String },

    #[error("Failed to read '{}': {error}", path.display())]
    Read { path: PathBuf, error: String },
}

/// A buffer could not be reserved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to allocate {bytes} bytes for {purpose}")]
pub struct AllocationError {
    /// Requested size.
    pub bytes: usize,
    /// What the buffer was for.
    pub purpose: &'static str,
}

/// Errors raised by a communicator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer {peer} disconnected")]
    Disconnected { peer: usize },

    #[error("Worker group aborted")]
    Aborted,

    #[error("Peer {peer} is not part of a group of {size}")]
    InvalidPeer { peer: usize, size: usize },

    #[error("Expected {expected:?} message from peer {peer}, got {got:?}")]
    UnexpectedMessage { peer: usize, expected: Tag, got: Tag },

    #[error("Peer {peer} sent {got} bytes, expected {expected}")]
    LengthMismatch {
        peer: usize,
        expected: usize,
        got: usize,
    },

    #[error("The coordinator must supply {0}")]
    MissingRootData(&'static str),

    #[error("Failed to spawn worker {rank}: {error}")]
    Spawn { rank: usize, error: String },

    #[error("Worker {rank} panicked")]
    Panicked { rank: usize },
}

// ============================================================================
// Error Utilities
// ============================================================================

impl TransportError {
    /// Whether this failure is only a consequence of another worker failing.
    pub fn is_secondary(&self) -> bool {
        matches!(
            self,
            TransportError::Disconnected { .. } | TransportError::Aborted
        )
    }
}

impl StencilError {
    /// Whether this error was triggered by a failure elsewhere in the group.
    ///
    /// When several workers fail, the engine reports the first error that is
    /// not secondary.
    pub fn is_secondary(&self) -> bool {
        match self {
            StencilError::Transport(e) => e.is_secondary(),
            _ => false,
        }
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            StencilError::Config(ConfigError::UnknownKernel { name }) => Some(format!(
                "Pick one of the built-in kernels or define '{}' in a --kernels file",
                name
            )),
            StencilError::Config(ConfigError::TooFewRows { height, .. }) => {
                Some(format!("Use at most {} workers", height))
            }
            StencilError::Config(ConfigError::HaloExceedsPartition { .. }) => {
                Some("Use fewer workers or a smaller kernel".to_string())
            }
            StencilError::Io(IoError::Load { path, .. }) => {
                Some(format!("Check that the file '{}' exists", path.display()))
            }
            _ => None,
        }
    }
}

/// Result type alias for halo-stencil operations.
pub type StencilResult<T> = Result<T, StencilError>;

/// Result type alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for communicator operations.
pub type TransportResult<T> = Result<T, TransportError>;
