//! Weighted neighborhood kernels and their application to tiles.

use crate::core::error::ConfigError;
use crate::core::tile::Tile;
use crate::core::types::BYTES_PER_PIXEL;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Largest kernel dimension accepted.
pub const MAX_KERNEL_DIM: usize = 63;

/// A square matrix of integer weights with a normalization factor.
///
/// Weights are stored row-major. The dimension is odd, so the kernel has a
/// center cell and a radius of `(dim - 1) / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    weights: Vec<i32>,
    dim: usize,
    factor: f32,
}

impl Kernel {
    /// Construct a kernel from row-major weights.
    pub fn new(weights: Vec<i32>, dim: usize, factor: f32) -> Result<Self, ConfigError> {
        if dim == 0 || dim % 2 == 0 {
            return Err(ConfigError::InvalidKernel {
                reason: format!("dimension {} is not odd", dim),
            });
        }
        if dim > MAX_KERNEL_DIM {
            return Err(ConfigError::InvalidKernel {
                reason: format!("dimension {} exceeds {}", dim, MAX_KERNEL_DIM),
            });
        }
        if weights.len() != dim * dim {
            return Err(ConfigError::InvalidKernel {
                reason: format!("expected {} weights, got {}", dim * dim, weights.len()),
            });
        }
        if !factor.is_finite() {
            return Err(ConfigError::InvalidKernel {
                reason: format!("factor {} is not finite", factor),
            });
        }
        Ok(Self {
            weights,
            dim,
            factor,
        })
    }

    /// The `dim x dim` kernel that copies its center pixel.
    pub fn identity(dim: usize) -> Result<Self, ConfigError> {
        let mut weights = vec![0; dim * dim];
        if let Some(center) = weights.get_mut(dim * dim / 2) {
            *center = 1;
        }
        Self::new(weights, dim, 1.0)
    }

    /// Side length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of cells on each side of the center.
    pub fn radius(&self) -> usize {
        (self.dim - 1) / 2
    }

    /// Normalization factor.
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Row-major weights.
    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    /// Weight at column `kx`, row `ky`.
    #[inline]
    pub fn at(&self, kx: usize, ky: usize) -> i32 {
        self.weights[ky * self.dim + kx]
    }

    /// Weight mirrored through the center, as used by a true convolution.
    #[inline]
    pub fn flipped(&self, kx: usize, ky: usize) -> i32 {
        self.at(self.dim - 1 - kx, self.dim - 1 - ky)
    }
}

/// Compute the owned rows of `output` from `input` and its halos.
///
/// For each owned pixel the neighbors inside the kernel window are weighted
/// by the flipped kernel, per red, green and blue channel. Neighbors outside
/// the image columns or outside the input's valid rows contribute nothing.
/// Rows are computed in parallel; every row depends only on `input`, so the
/// result does not depend on scheduling.
pub fn apply(output: &mut Tile, input: &Tile, kernel: &Kernel) {
    debug_assert!(output.same_shape(input), "tiles differ in shape");
    debug_assert_eq!(input.radius(), kernel.radius(), "halo depth differs from kernel radius");

    let row_bytes = input.row_bytes();
    if row_bytes == 0 {
        return;
    }
    let window = RowWindow {
        src: input.as_bytes(),
        row_bytes,
        width: input.width(),
        valid: input.valid_rows(),
    };
    let owned_start = input.owned_start();

    output
        .owned_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(i, out_row)| window.convolve_row(owned_start + i, kernel, out_row));
}

/// Read-only view of an input tile for row-wise convolution.
struct RowWindow<'a> {
    src: &'a [u8],
    row_bytes: usize,
    width: usize,
    valid: Range<usize>,
}

impl RowWindow<'_> {
    fn convolve_row(&self, y: usize, kernel: &Kernel, out_row: &mut [u8]) {
        let dim = kernel.dim();
        let radius = kernel.radius();

        for x in 0..self.width {
            let mut sums = [0i64; 3];

            for ky in 0..dim {
                let Some(sy) = (y + ky).checked_sub(radius) else {
                    continue;
                };
                if !self.valid.contains(&sy) {
                    continue;
                }
                let row = &self.src[sy * self.row_bytes..(sy + 1) * self.row_bytes];

                for kx in 0..dim {
                    let Some(sx) = (x + kx).checked_sub(radius) else {
                        continue;
                    };
                    if sx >= self.width {
                        continue;
                    }
                    let weight = kernel.flipped(kx, ky) as i64;
                    if weight == 0 {
                        continue;
                    }
                    let pixel = &row[sx * BYTES_PER_PIXEL..sx * BYTES_PER_PIXEL + 3];
                    for (sum, &channel) in sums.iter_mut().zip(pixel) {
                        *sum += weight * channel as i64;
                    }
                }
            }

            let out = &mut out_row[x * BYTES_PER_PIXEL..(x + 1) * BYTES_PER_PIXEL];
            out.copy_from_slice(&finish_pixel(sums, kernel.factor()));
        }
    }
}

/// Turn channel sums into an output pixel.
///
/// An all-zero sum maps straight to opaque black without consulting the
/// factor; anything else is scaled, clamped and truncated.
#[inline]
fn finish_pixel(sums: [i64; 3], factor: f32) -> [u8; 4] {
    if sums == [0, 0, 0] {
        return [0, 0, 0, 255];
    }
    let scale = |sum: i64| (sum as f64 * factor as f64).clamp(0.0, 255.0) as u8;
    [scale(sums[0]), scale(sums[1]), scale(sums[2]), 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::WorkerTopology;

    fn tile_from_pixels(width: usize, rows: &[&[[u8; 4]]], radius: usize) -> Tile {
        let mut tile = Tile::allocate(width, rows.len(), radius).unwrap();
        let bytes: Vec<u8> = rows.iter().flat_map(|r| r.iter().flatten().copied()).collect();
        tile.owned_mut().copy_from_slice(&bytes);
        tile
    }

    fn pixel(tile: &Tile, x: usize, row: usize) -> [u8; 4] {
        let bytes = &tile.owned()[row * tile.row_bytes() + x * 4..][..4];
        [bytes[0], bytes[1], bytes[2], bytes[3]]
    }

    #[test]
    fn test_kernel_validation() {
        assert!(Kernel::new(vec![1; 9], 3, 1.0).is_ok());
        assert!(Kernel::new(vec![1; 4], 2, 1.0).is_err());
        assert!(Kernel::new(vec![1; 8], 3, 1.0).is_err());
        assert!(Kernel::new(vec![1; 9], 3, f32::NAN).is_err());
        assert!(Kernel::new(Vec::new(), 0, 1.0).is_err());
    }

    #[test]
    fn test_radius_and_flip() {
        let kernel = Kernel::new((1..=9).collect(), 3, 1.0).unwrap();
        assert_eq!(kernel.radius(), 1);
        assert_eq!(kernel.at(0, 0), 1);
        assert_eq!(kernel.flipped(0, 0), 9);
        assert_eq!(kernel.flipped(2, 1), 4);
        assert_eq!(kernel.flipped(1, 1), 5);
    }

    #[test]
    fn test_finish_pixel_zero_case() {
        assert_eq!(finish_pixel([0, 0, 0], 0.0), [0, 0, 0, 255]);
        assert_eq!(finish_pixel([0, 0, 0], 100.0), [0, 0, 0, 255]);
        assert_eq!(finish_pixel([-5, 300, 10], 1.0), [0, 255, 10, 255]);
        assert_eq!(finish_pixel([10, 19, 1], 0.1), [1, 1, 0, 255]);
    }

    #[test]
    fn test_identity_preserves_colors() {
        let kernel = Kernel::identity(3).unwrap();
        let input = tile_from_pixels(
            2,
            &[&[[10, 20, 30, 255], [1, 2, 3, 255]], &[[0, 0, 0, 7], [9, 8, 7, 255]]],
            1,
        );
        let mut output = Tile::allocate(2, 2, 1).unwrap();
        apply(&mut output, &input, &kernel);

        assert_eq!(pixel(&output, 0, 0), [10, 20, 30, 255]);
        assert_eq!(pixel(&output, 1, 0), [1, 2, 3, 255]);
        // black maps to opaque black
        assert_eq!(pixel(&output, 0, 1), [0, 0, 0, 255]);
        assert_eq!(pixel(&output, 1, 1), [9, 8, 7, 255]);
    }

    #[test]
    fn test_convolution_is_flipped() {
        // Weight only on the left cell. A correlation would read the left
        // neighbor; a convolution reads the right one.
        let kernel = Kernel::new(vec![0, 0, 0, 1, 0, 0, 0, 0, 0], 3, 1.0).unwrap();
        let input = tile_from_pixels(
            3,
            &[&[[10, 10, 10, 255], [20, 20, 20, 255], [30, 30, 30, 255]]],
            1,
        );
        let mut output = Tile::allocate(3, 1, 1).unwrap();
        apply(&mut output, &input, &kernel);

        assert_eq!(pixel(&output, 0, 0), [20, 20, 20, 255]);
        assert_eq!(pixel(&output, 1, 0), [30, 30, 30, 255]);
        assert_eq!(pixel(&output, 2, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_box_blur_edges_contribute_nothing() {
        let kernel = Kernel::new(vec![1; 9], 3, 1.0).unwrap();
        let row: [[u8; 4]; 3] = [[1, 2, 3, 255]; 3];
        let input = tile_from_pixels(3, &[&row, &row, &row], 1);
        let mut output = Tile::allocate(3, 3, 1).unwrap();
        apply(&mut output, &input, &kernel);

        assert_eq!(pixel(&output, 1, 1), [9, 18, 27, 255]);
        assert_eq!(pixel(&output, 0, 0), [4, 8, 12, 255]);
        assert_eq!(pixel(&output, 1, 0), [6, 12, 18, 255]);
    }

    #[test]
    fn test_halo_rows_are_read_when_neighbored() {
        let kernel = Kernel::new(vec![0, 1, 0, 0, 0, 0, 0, 0, 0], 3, 1.0).unwrap();
        // flipped: reads the pixel below
        let mut input = tile_from_pixels(1, &[&[[5, 5, 5, 255]]], 1);
        input
            .exchange_slots(crate::core::topology::Direction::Down)
            .1
            .copy_from_slice(&[40, 50, 60, 255]);

        let mut output = Tile::allocate(1, 1, 1).unwrap();
        apply(&mut output, &input, &kernel);
        assert_eq!(pixel(&output, 0, 0), [0, 0, 0, 255]);

        let input = input.with_neighbors(&WorkerTopology::new(0, 2));
        apply(&mut output, &input, &kernel);
        assert_eq!(pixel(&output, 0, 0), [40, 50, 60, 255]);
    }

    #[test]
    fn test_zero_tile_becomes_opaque_black() {
        let kernel = Kernel::new(vec![3, -1, 2, 7, 1, 0, 4, 4, -9], 3, 0.5).unwrap();
        let input = Tile::allocate(4, 3, 1).unwrap();
        let mut output = Tile::allocate(4, 3, 1).unwrap();
        apply(&mut output, &input, &kernel);
        assert!(output.owned().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }
}
