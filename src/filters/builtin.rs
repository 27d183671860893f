//! Built-in kernels.
//!
//! Every kernel here is 3x3 except `gauss5`.

use crate::core::kernel::Kernel;
use crate::filters::catalog::KernelCatalog;

struct Builtin {
    name: &'static str,
    description: &'static str,
    dim: usize,
    factor: f32,
    weights: &'static [i32],
}

#[rustfmt::skip]
const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "identity",
        description: "Copies each pixel unchanged",
        dim: 3,
        factor: 1.0,
        weights: &[0, 0, 0,
                   0, 1, 0,
                   0, 0, 0],
    },
    Builtin {
        name: "box",
        description: "3x3 mean blur",
        dim: 3,
        factor: 1.0 / 9.0,
        weights: &[1, 1, 1,
                   1, 1, 1,
                   1, 1, 1],
    },
    Builtin {
        name: "gauss3",
        description: "3x3 Gaussian blur",
        dim: 3,
        factor: 1.0 / 16.0,
        weights: &[1, 2, 1,
                   2, 4, 2,
                   1, 2, 1],
    },
    Builtin {
        name: "gauss5",
        description: "5x5 Gaussian blur",
        dim: 5,
        factor: 1.0 / 256.0,
        weights: &[1,  4,  6,  4, 1,
                   4, 16, 24, 16, 4,
                   6, 24, 36, 24, 6,
                   4, 16, 24, 16, 4,
                   1,  4,  6,  4, 1],
    },
    Builtin {
        name: "sharpen",
        description: "Sharpen",
        dim: 3,
        factor: 1.0,
        weights: &[ 0, -1,  0,
                   -1,  5, -1,
                    0, -1,  0],
    },
    Builtin {
        name: "edge",
        description: "Edge detection, all directions",
        dim: 3,
        factor: 1.0,
        weights: &[-1, -1, -1,
                   -1,  8, -1,
                   -1, -1, -1],
    },
    Builtin {
        name: "laplacian",
        description: "4-neighbor Laplacian",
        dim: 3,
        factor: 1.0,
        weights: &[0,  1, 0,
                   1, -4, 1,
                   0,  1, 0],
    },
    Builtin {
        name: "sobel_x",
        description: "Horizontal Sobel gradient",
        dim: 3,
        factor: 1.0,
        weights: &[-1, 0, 1,
                   -2, 0, 2,
                   -1, 0, 1],
    },
    Builtin {
        name: "sobel_y",
        description: "Vertical Sobel gradient",
        dim: 3,
        factor: 1.0,
        weights: &[-1, -2, -1,
                    0,  0,  0,
                    1,  2,  1],
    },
    Builtin {
        name: "emboss",
        description: "Emboss",
        dim: 3,
        factor: 1.0,
        weights: &[-2, -1, 0,
                   -1,  1, 1,
                    0,  1, 2],
    },
];

/// Register all built-in kernels.
pub fn register_all(catalog: &mut KernelCatalog) {
    for builtin in BUILTINS {
        match Kernel::new(builtin.weights.to_vec(), builtin.dim, builtin.factor) {
            Ok(kernel) => catalog.register(builtin.name, builtin.description, kernel),
            Err(e) => log::error!("Skipping built-in kernel '{}': {}", builtin.name, e),
        }
    }
}
