//! Kernel module.
//!
//! Contains the kernel catalog and the built-in kernel definitions.

pub mod builtin;
pub mod catalog;

pub use catalog::{CatalogEntry, KernelCatalog};
