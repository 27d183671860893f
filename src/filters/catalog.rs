//! Kernel catalog for looking up kernels by name.

use crate::core::error::{ConfigError, IoError, StencilError};
use crate::core::kernel::Kernel;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Catalog entry: a kernel plus a short description for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// The kernel itself.
    pub kernel: Kernel,
    /// One-line description.
    pub description: String,
}

/// Registry of named kernels.
///
/// Names keep their registration order, so listings show the built-in
/// kernels first and file-defined ones after them. Registering an existing
/// name replaces the kernel in place.
#[derive(Debug, Clone, Default)]
pub struct KernelCatalog {
    kernels: IndexMap<String, CatalogEntry>,
}

/// On-disk catalog format.
///
/// ```toml
/// [[kernel]]
/// name = "blur3"
/// dim = 3
/// factor = 0.0625
/// weights = [1, 2, 1, 2, 4, 2, 1, 2, 1]
/// description = "Small blur"
/// ```
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    kernel: Vec<KernelDef>,
}

#[derive(Debug, Deserialize)]
struct KernelDef {
    name: String,
    dim: usize,
    #[serde(default = "default_factor")]
    factor: f32,
    weights: Vec<i32>,
    #[serde(default)]
    description: Option<String>,
}

fn default_factor() -> f32 {
    1.0
}

impl KernelCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-populated with the built-in kernels.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::filters::builtin::register_all(&mut catalog);
        catalog
    }

    /// Register a kernel under `name`.
    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>, kernel: Kernel) {
        let name = name.into();
        let entry = CatalogEntry {
            kernel,
            description: description.into(),
        };
        if self.kernels.insert(name.clone(), entry).is_some() {
            log::debug!("Kernel '{}' redefined", name);
        }
    }

    /// Look up a kernel by name.
    pub fn lookup(&self, name: &str) -> Result<&Kernel, ConfigError> {
        self.kernels
            .get(name)
            .map(|entry| &entry.kernel)
            .ok_or_else(|| ConfigError::UnknownKernel {
                name: name.to_string(),
            })
    }

    /// Get a catalog entry.
    pub fn entry(&self, name: &str) -> Option<&CatalogEntry> {
        self.kernels.get(name)
    }

    /// Check if a kernel is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// All kernel names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(|s| s.as_str())
    }

    /// All entries, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.kernels.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Add every kernel defined in a TOML document. Returns how many were
    /// added.
    ///
    /// The document is validated as a whole: if any definition is invalid,
    /// nothing is registered.
    pub fn load_toml_str(&mut self, source: &str) -> Result<usize, ConfigError> {
        let file: CatalogFile =
            toml::from_str(source).map_err(|e| ConfigError::InvalidCatalog(e.to_string()))?;

        let mut parsed = Vec::with_capacity(file.kernel.len());
        for def in file.kernel {
            if def.name.trim().is_empty() {
                return Err(ConfigError::InvalidCatalog(
                    "kernel name cannot be empty".to_string(),
                ));
            }
            let kernel = Kernel::new(def.weights, def.dim, def.factor).map_err(|e| {
                ConfigError::InvalidCatalog(format!("kernel '{}': {}", def.name, e))
            })?;
            let description = def
                .description
                .unwrap_or_else(|| format!("{0}x{0} user kernel", def.dim));
            parsed.push((def.name, description, kernel));
        }

        let count = parsed.len();
        for (name, description, kernel) in parsed {
            self.register(name, description, kernel);
        }
        Ok(count)
    }

    /// Add every kernel defined in a TOML file.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, StencilError> {
        let source = std::fs::read_to_string(path).map_err(|e| IoError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let count = self.load_toml_str(&source)?;
        log::info!("Loaded {} kernels from {}", count, path.display());
        Ok(count)
    }
}
