//! Immutable per-job configuration and its wire record.
//!
//! The coordinator builds one [`JobConfig`] and broadcasts it to every
//! worker. The record layout is fixed:
//!
//! | offset | field        | type      |
//! |--------|--------------|-----------|
//! | 0      | magic        | `u32` LE  |
//! | 4      | width        | `u32` LE  |
//! | 8      | height       | `u32` LE  |
//! | 12     | iterations   | `u32` LE  |
//! | 16     | kernel_dim   | `u32` LE  |
//! | 20     | factor bits  | `u32` LE (IEEE-754 `f32`) |
//! | 24     | weights      | `kernel_dim²` × `i32` LE, row-major |

use crate::core::error::ConfigError;
use crate::core::kernel::Kernel;
use crate::core::partition::PartitionPlan;
use crate::core::types::ImageDescriptor;
use bytemuck::{Pod, Zeroable};

/// Marks a job record ("HALO" in ASCII).
pub const JOB_MAGIC: u32 = u32::from_le_bytes(*b"HALO");

const HEADER_LEN: usize = std::mem::size_of::<WireHeader>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct WireHeader {
    magic: u32,
    width: u32,
    height: u32,
    iterations: u32,
    kernel_dim: u32,
    factor_bits: u32,
}

impl WireHeader {
    fn swap_le(self) -> Self {
        Self {
            magic: self.magic.to_le(),
            width: self.width.to_le(),
            height: self.height.to_le(),
            iterations: self.iterations.to_le(),
            kernel_dim: self.kernel_dim.to_le(),
            factor_bits: self.factor_bits.to_le(),
        }
    }
}

/// Everything a worker needs to take part in a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// Dimensions of the image being filtered.
    pub image: ImageDescriptor,
    /// Kernel applied every iteration.
    pub kernel: Kernel,
    /// Number of exchange-compute rounds.
    pub iterations: u32,
}

impl JobConfig {
    /// Create a job configuration.
    pub fn new(image: ImageDescriptor, kernel: Kernel, iterations: u32) -> Self {
        Self {
            image,
            kernel,
            iterations,
        }
    }

    /// Check the job against a group size and return its partition plan.
    ///
    /// Rejects kernel radii larger than either image side and halos deeper
    /// than the rows a worker owns. A radius equal to a side is fine: the
    /// out-of-image neighbors just contribute nothing.
    pub fn plan(&self, workers: usize) -> Result<PartitionPlan, ConfigError> {
        let radius = self.kernel.radius();
        if radius > self.image.width || radius > self.image.height {
            return Err(ConfigError::KernelLargerThanImage {
                radius,
                width: self.image.width,
                height: self.image.height,
            });
        }
        self.header()?;
        let plan = PartitionPlan::new(&self.image, workers)?;
        plan.check_radius(radius)?;
        Ok(plan)
    }

    fn header(&self) -> Result<WireHeader, ConfigError> {
        let field = |value: usize, name: &str| {
            u32::try_from(value).map_err(|_| {
                ConfigError::MalformedRecord(format!(
                    "{} {} of image {} does not fit the record",
                    name, value, self.image
                ))
            })
        };
        Ok(WireHeader {
            magic: JOB_MAGIC,
            width: field(self.image.width, "width")?,
            height: field(self.image.height, "height")?,
            iterations: self.iterations,
            kernel_dim: field(self.kernel.dim(), "kernel dimension")?,
            factor_bits: self.kernel.factor().to_bits(),
        })
    }

    /// Serialize into the fixed wire layout.
    ///
    /// Fails if a dimension does not fit the record's `u32` fields.
    pub fn encode(&self) -> Result<Vec<u8>, ConfigError> {
        let header = self.header()?.swap_le();

        let weights = self.kernel.weights();
        let mut bytes = Vec::with_capacity(HEADER_LEN + weights.len() * 4);
        bytes.extend_from_slice(bytemuck::bytes_of(&header));
        for weight in weights {
            bytes.extend_from_slice(&weight.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Parse a record produced by [`JobConfig::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() < HEADER_LEN {
            return Err(ConfigError::MalformedRecord(format!(
                "{} bytes is shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }
        let (head, body) = bytes.split_at(HEADER_LEN);
        let header = bytemuck::pod_read_unaligned::<WireHeader>(head).swap_le();

        if header.magic != JOB_MAGIC {
            return Err(ConfigError::MalformedRecord(format!(
                "bad magic {:#010x}",
                header.magic
            )));
        }

        let dim = header.kernel_dim as usize;
        let expected = dim
            .checked_mul(dim)
            .and_then(|cells| cells.checked_mul(4))
            .ok_or_else(|| ConfigError::MalformedRecord(format!("kernel dimension {}", dim)))?;
        if body.len() != expected {
            return Err(ConfigError::MalformedRecord(format!(
                "expected {} weight bytes, got {}",
                expected,
                body.len()
            )));
        }

        let weights = body
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let kernel = Kernel::new(weights, dim, f32::from_bits(header.factor_bits))?;

        Ok(Self {
            image: ImageDescriptor::new(header.width as usize, header.height as usize),
            kernel,
            iterations: header.iterations,
        })
    }
}
