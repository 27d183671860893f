//! Static row partitioning of an image across a fixed worker group.
//!
//! The plan is computed once per job and shared read-only; scatter and gather
//! both walk the same table, so row ordering is preserved for any worker
//! count.

use crate::core::error::ConfigError;
use crate::core::types::ImageDescriptor;

/// One worker's contiguous slice of image rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    /// First image row owned by the worker.
    pub row_start: usize,
    /// Number of rows owned.
    pub row_count: usize,
    /// Offset of the first owned byte in the full image buffer.
    pub byte_offset: usize,
    /// Length of the owned byte range.
    pub byte_len: usize,
}

impl RowSpan {
    /// One past the last owned row.
    pub fn row_end(&self) -> usize {
        self.row_start + self.row_count
    }

    /// One past the last owned byte.
    pub fn byte_end(&self) -> usize {
        self.byte_offset + self.byte_len
    }
}

/// Per-worker row ranges, byte lengths and displacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    row_bytes: usize,
    spans: Vec<RowSpan>,
}

impl PartitionPlan {
    /// Split `image` by rows across `workers`.
    ///
    /// The first `height % workers` workers receive one extra row. Fails when
    /// a worker would receive no rows at all.
    pub fn new(image: &ImageDescriptor, workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if image.height < workers {
            return Err(ConfigError::TooFewRows {
                height: image.height,
                workers,
            });
        }

        let row_bytes = image.row_bytes();
        let base = image.height / workers;
        let remainder = image.height % workers;

        let mut spans = Vec::with_capacity(workers);
        let mut row_start = 0;
        let mut byte_offset = 0;
        for rank in 0..workers {
            let row_count = if rank < remainder { base + 1 } else { base };
            let byte_len = row_count * row_bytes;
            spans.push(RowSpan {
                row_start,
                row_count,
                byte_offset,
                byte_len,
            });
            row_start += row_count;
            byte_offset += byte_len;
        }

        Ok(Self { row_bytes, spans })
    }

    /// Number of workers the plan covers.
    pub fn worker_count(&self) -> usize {
        self.spans.len()
    }

    /// The span owned by `rank`.
    pub fn span(&self, rank: usize) -> Option<&RowSpan> {
        self.spans.get(rank)
    }

    /// All spans in rank order.
    pub fn spans(&self) -> &[RowSpan] {
        &self.spans
    }

    /// Bytes in one image row.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Total rows covered.
    pub fn total_rows(&self) -> usize {
        self.spans.last().map(RowSpan::row_end).unwrap_or(0)
    }

    /// Total bytes covered.
    pub fn total_bytes(&self) -> usize {
        self.spans.last().map(RowSpan::byte_end).unwrap_or(0)
    }

    /// Smallest row count of any worker.
    pub fn min_rows(&self) -> usize {
        self.spans.iter().map(|s| s.row_count).min().unwrap_or(0)
    }

    /// Rank owning image row `row`.
    pub fn owner_of_row(&self, row: usize) -> Option<usize> {
        self.spans
            .iter()
            .position(|s| row >= s.row_start && row < s.row_end())
    }

    /// Reject halos that would reach past the immediate neighbor.
    ///
    /// Exchange only talks to adjacent workers, so with more than one worker
    /// every worker must own at least `radius` rows.
    pub fn check_radius(&self, radius: usize) -> Result<(), ConfigError> {
        if self.spans.len() < 2 {
            return Ok(());
        }
        match self.spans.iter().position(|s| s.row_count < radius) {
            Some(worker) => Err(ConfigError::HaloExceedsPartition {
                worker,
                rows: self.spans[worker].row_count,
                radius,
            }),
            None => Ok(()),
        }
    }
}
