//! Halo-padded row tiles.
//!
//! A tile holds one worker's owned rows plus `radius` halo rows above and
//! below:
//!
//! ```text
//! row 0                  +------------------+
//!                        |  upper halo (r)  |  <- neighbor above
//! row r                  +------------------+
//!                        |  owned rows      |  <- scatter / gather
//! row r + rows           +------------------+
//!                        |  lower halo (r)  |  <- neighbor below
//! row rows + 2r          +------------------+
//! ```
//!
//! Halo rows are allocated on both sides even at the two image edges. There
//! the outward halo is never written by an exchange and is excluded from the
//! kernel's valid row range.

use crate::core::error::AllocationError;
use crate::core::topology::{Direction, WorkerTopology};
use crate::core::types::BYTES_PER_PIXEL;
use std::ops::Range;

/// A worker's owned rows with halo padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    width: usize,
    rows: usize,
    radius: usize,
    has_upper: bool,
    has_lower: bool,
    data: Vec<u8>,
}

impl Tile {
    /// Allocate a zeroed tile of `rows` owned rows with `radius` halo rows on
    /// each side. The tile starts without neighbors.
    pub fn allocate(width: usize, rows: usize, radius: usize) -> Result<Self, AllocationError> {
        let total_rows = rows + 2 * radius;
        let bytes = total_rows
            .checked_mul(width * BYTES_PER_PIXEL)
            .ok_or(AllocationError {
                bytes: usize::MAX,
                purpose: "tile",
            })?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes).map_err(|_| AllocationError {
            bytes,
            purpose: "tile",
        })?;
        data.resize(bytes, 0);

        Ok(Self {
            width,
            rows,
            radius,
            has_upper: false,
            has_lower: false,
            data,
        })
    }

    /// Mark which halos are fed by a neighbor.
    pub fn with_neighbors(mut self, topology: &WorkerTopology) -> Self {
        self.has_upper = topology.upper.is_some();
        self.has_lower = topology.lower.is_some();
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of owned rows.
    pub fn owned_rows(&self) -> usize {
        self.rows
    }

    /// Halo depth on each side.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Owned rows plus both halos.
    pub fn total_rows(&self) -> usize {
        self.rows + 2 * self.radius
    }

    /// Bytes in one row.
    pub fn row_bytes(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }

    /// Buffer rows holding meaningful data: owned rows plus every halo that
    /// faces a neighbor.
    pub fn valid_rows(&self) -> Range<usize> {
        let start = if self.has_upper { 0 } else { self.radius };
        let end = if self.has_lower {
            self.total_rows()
        } else {
            self.radius + self.rows
        };
        start..end
    }

    /// Buffer row index of the first owned row.
    pub fn owned_start(&self) -> usize {
        self.radius
    }

    /// The whole buffer, halos included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The owned region.
    pub fn owned(&self) -> &[u8] {
        &self.data[self.byte_range(self.radius..self.radius + self.rows)]
    }

    /// The owned region, mutably.
    pub fn owned_mut(&mut self) -> &mut [u8] {
        let range = self.byte_range(self.radius..self.radius + self.rows);
        &mut self.data[range]
    }

    /// The halo rows on one side.
    pub fn halo(&self, direction: Direction) -> &[u8] {
        &self.data[self.byte_range(self.halo_rows(direction))]
    }

    /// The owned rows a neighbor on `direction` needs as its halo.
    pub fn boundary(&self, direction: Direction) -> &[u8] {
        &self.data[self.byte_range(self.boundary_rows(direction))]
    }

    /// Borrow the outgoing boundary rows and the incoming halo slot for one
    /// side at the same time.
    pub fn exchange_slots(&mut self, direction: Direction) -> (&[u8], &mut [u8]) {
        debug_assert!(self.rows >= self.radius, "halo deeper than owned rows");
        let row_bytes = self.row_bytes();
        let boundary = self.boundary_rows(direction);
        match direction {
            Direction::Up => {
                let (halo, rest) = self.data.split_at_mut(self.radius * row_bytes);
                let start = (boundary.start - self.radius) * row_bytes;
                let end = (boundary.end - self.radius) * row_bytes;
                (&rest[start..end], halo)
            }
            Direction::Down => {
                let split = (self.radius + self.rows) * row_bytes;
                let (front, halo) = self.data.split_at_mut(split);
                (
                    &front[boundary.start * row_bytes..boundary.end * row_bytes],
                    halo,
                )
            }
        }
    }

    /// One buffer row.
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[self.byte_range(row..row + 1)]
    }

    /// Whether `other` has the same shape, so one can be computed from the
    /// other.
    pub fn same_shape(&self, other: &Tile) -> bool {
        self.width == other.width && self.rows == other.rows && self.radius == other.radius
    }

    fn halo_rows(&self, direction: Direction) -> Range<usize> {
        match direction {
            Direction::Up => 0..self.radius,
            Direction::Down => self.radius + self.rows..self.total_rows(),
        }
    }

    fn boundary_rows(&self, direction: Direction) -> Range<usize> {
        match direction {
            Direction::Up => self.radius..2 * self.radius,
            Direction::Down => self.rows..self.rows + self.radius,
        }
    }

    fn byte_range(&self, rows: Range<usize>) -> Range<usize> {
        let row_bytes = self.row_bytes();
        rows.start * row_bytes..rows.end * row_bytes
    }
}
