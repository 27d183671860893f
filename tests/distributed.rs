use halo_stencil::prelude::*;
use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use std::cell::Cell;
use std::thread;

fn pattern(width: u32, height: u32, seed: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(73) ^ y.wrapping_mul(151) ^ seed;
        Rgba([v as u8, (v >> 3) as u8, (v >> 6) as u8 | 1, (v >> 2) as u8])
    })
}

fn run(job: &JobConfig, image: &RgbaImage, workers: usize) -> RgbaImage {
    StencilEngine::with_options(EngineOptions::new().with_workers(workers))
        .run(job, image)
        .unwrap()
        .image
}

/// Straightforward whole-image convolution, one iteration.
fn reference_step(image: &RgbaImage, kernel: &Kernel) -> RgbaImage {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let dim = kernel.dim();
    let radius = kernel.radius() as i64;

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let mut sums = [0i64; 3];
        for ky in 0..dim {
            for kx in 0..dim {
                let sx = x as i64 + kx as i64 - radius;
                let sy = y as i64 + ky as i64 - radius;
                if sx < 0 || sy < 0 || sx >= width || sy >= height {
                    continue;
                }
                let weight = kernel.at(dim - 1 - kx, dim - 1 - ky) as i64;
                let pixel = image.get_pixel(sx as u32, sy as u32);
                for c in 0..3 {
                    sums[c] += weight * pixel[c] as i64;
                }
            }
        }
        if sums == [0, 0, 0] {
            return Rgba([0, 0, 0, 255]);
        }
        let scale = |s: i64| (s as f64 * kernel.factor() as f64).clamp(0.0, 255.0) as u8;
        Rgba([scale(sums[0]), scale(sums[1]), scale(sums[2]), 255])
    })
}

#[test]
fn zero_iterations_return_input_unchanged() {
    let image = pattern(7, 9, 3);
    let kernel = KernelCatalog::with_builtins().lookup("edge").unwrap().clone();
    let job = JobConfig::new(ImageDescriptor::of(&image), kernel, 0);

    for workers in [1, 3, 9] {
        assert_eq!(run(&job, &image, workers), image, "{} workers", workers);
    }
}

#[test]
fn zero_image_becomes_opaque_black() {
    let image = RgbaImage::new(6, 6);
    let catalog = KernelCatalog::with_builtins();
    for name in catalog.names() {
        let kernel = catalog.lookup(name).unwrap().clone();
        let job = JobConfig::new(ImageDescriptor::of(&image), kernel, 2);
        let output = run(&job, &image, 3);
        assert!(
            output.pixels().all(|p| p == &Rgba([0, 0, 0, 255])),
            "kernel {}",
            name
        );
    }
}

#[test]
fn identity_preserves_opaque_image() {
    let mut image = pattern(8, 10, 11);
    for pixel in image.pixels_mut() {
        pixel[2] |= 1;
        pixel[3] = 255;
    }
    for dim in [1, 3, 5] {
        let job = JobConfig::new(ImageDescriptor::of(&image), Kernel::identity(dim).unwrap(), 1);
        assert_eq!(run(&job, &image, 4), image, "dim {}", dim);
    }
}

#[test]
fn single_row_and_single_column_images_convolve() {
    let mut row = pattern(5, 1, 7);
    let mut column = pattern(1, 6, 2);
    for pixel in row.pixels_mut().chain(column.pixels_mut()) {
        pixel[2] |= 1;
        pixel[3] = 255;
    }

    let identity = Kernel::identity(3).unwrap();
    let job = JobConfig::new(ImageDescriptor::of(&row), identity.clone(), 1);
    assert_eq!(run(&job, &row, 1), row);
    let job = JobConfig::new(ImageDescriptor::of(&column), identity, 1);
    assert_eq!(run(&job, &column, 2), column);

    let kernel = KernelCatalog::with_builtins().lookup("box").unwrap().clone();
    for (image, workers) in [(&row, 1), (&column, 2), (&column, 3)] {
        let job = JobConfig::new(ImageDescriptor::of(image), kernel.clone(), 2);
        let expected = reference_step(&reference_step(image, &kernel), &kernel);
        assert_eq!(run(&job, image, workers), expected, "{} workers", workers);
    }
}

#[test]
fn gather_restores_row_order() {
    // Each row is tagged with its index; the identity kernel leaves it alone.
    let image = RgbaImage::from_fn(3, 13, |_, y| Rgba([y as u8 + 1, 0, 0, 255]));
    let job = JobConfig::new(ImageDescriptor::of(&image), Kernel::identity(3).unwrap(), 1);
    let output = run(&job, &image, 5);

    let row_bytes = 3 * 4;
    for (y, row) in output.as_raw().chunks(row_bytes).enumerate() {
        assert_eq!(row[0], y as u8 + 1, "row {} out of place", y);
    }
}

#[test]
fn matches_reference_convolution() {
    let image = pattern(11, 14, 5);
    let catalog = KernelCatalog::with_builtins();
    for name in ["gauss3", "gauss5", "sharpen", "sobel_y", "emboss"] {
        let kernel = catalog.lookup(name).unwrap().clone();
        let expected = reference_step(&reference_step(&image, &kernel), &kernel);
        let job = JobConfig::new(ImageDescriptor::of(&image), kernel, 2);
        assert_eq!(run(&job, &image, 3), expected, "kernel {}", name);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn any_worker_count_matches_single_worker(
        width in 3u32..12,
        height in 6u32..20,
        workers in 2usize..6,
        iterations in 1u32..4,
        seed in any::<u32>(),
        kernel_index in 0usize..10,
    ) {
        let catalog = KernelCatalog::with_builtins();
        let name = catalog.names().nth(kernel_index).unwrap().to_string();
        let kernel = catalog.lookup(&name).unwrap().clone();
        let radius = kernel.radius() as u32;
        prop_assume!(width > radius);
        prop_assume!(height / workers as u32 >= radius.max(1));

        let image = pattern(width, height, seed);
        let job = JobConfig::new(ImageDescriptor::of(&image), kernel, iterations);
        prop_assert_eq!(run(&job, &image, workers), run(&job, &image, 1));
    }
}

/// Fails its `fail_at`-th exchange and aborts the group, as a worker that
/// hits a local error would.
struct FaultyComm<'a> {
    inner: &'a LocalComm,
    fail_at: usize,
    exchanges: Cell<usize>,
}

impl Communicator for FaultyComm<'_> {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn broadcast(&self, payload: Option<&[u8]>) -> Result<Vec<u8>, TransportError> {
        self.inner.broadcast(payload)
    }

    fn scatter_rows(
        &self,
        plan: &PartitionPlan,
        image: Option<&[u8]>,
        owned: &mut [u8],
    ) -> Result<(), TransportError> {
        self.inner.scatter_rows(plan, image, owned)
    }

    fn exchange(&self, peer: usize, send: &[u8], recv: &mut [u8]) -> Result<(), TransportError> {
        let count = self.exchanges.get() + 1;
        self.exchanges.set(count);
        if count == self.fail_at {
            return Err(TransportError::LengthMismatch {
                peer,
                expected: recv.len(),
                got: 0,
            });
        }
        self.inner.exchange(peer, send, recv)
    }

    fn barrier(&self) -> Result<(), TransportError> {
        self.inner.barrier()
    }

    fn gather_rows(
        &self,
        plan: &PartitionPlan,
        owned: &[u8],
        image: Option<&mut [u8]>,
    ) -> Result<(), TransportError> {
        self.inner.gather_rows(plan, owned, image)
    }

    fn abort(&self) {
        self.inner.abort()
    }
}

#[test]
fn failing_worker_terminates_the_group() {
    let image = pattern(5, 12, 9);
    let kernel = KernelCatalog::with_builtins().lookup("box").unwrap().clone();
    let job = JobConfig::new(ImageDescriptor::of(&image), kernel, 5);
    let comms = LocalCluster::create(4).unwrap();

    let results: Vec<Result<WorkerOutput, StencilError>> = thread::scope(|s| {
        let handles: Vec<_> = comms
            .iter()
            .map(|comm| {
                let (job, input) = if comm.is_coordinator() {
                    (Some(&job), Some(&image))
                } else {
                    (None, None)
                };
                s.spawn(move || {
                    let result = if comm.rank() == 2 {
                        let faulty = FaultyComm {
                            inner: comm,
                            fail_at: 3,
                            exchanges: Cell::new(0),
                        };
                        run_worker(&faulty, job, input, None)
                    } else {
                        run_worker(comm, job, input, None)
                    };
                    if result.is_err() {
                        comm.abort();
                    }
                    result
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(matches!(
        &results[2],
        Err(StencilError::Transport(TransportError::LengthMismatch { .. }))
    ));
    for (rank, result) in results.iter().enumerate() {
        match result {
            Err(e) if rank != 2 => assert!(e.is_secondary(), "worker {}: {}", rank, e),
            Err(_) => {}
            Ok(_) => panic!("worker {} finished despite the failure", rank),
        }
    }
}

#[test]
fn panicking_worker_aborts_the_group() {
    let image = pattern(4, 8, 1);
    let job = JobConfig::new(ImageDescriptor::of(&image), Kernel::identity(3).unwrap(), 3);
    let comms = LocalCluster::create(2).unwrap();
    let handle = comms[0].abort_handle();
    let mut comms = comms.into_iter();
    let coordinator = comms.next().unwrap();
    let doomed = comms.next().unwrap();

    let result = thread::scope(|s| {
        let panicking = s.spawn(move || {
            let _comm = doomed;
            panic!("worker lost");
        });
        let result = run_worker(&coordinator, Some(&job), Some(&image), None);
        assert!(panicking.join().is_err());
        result
    });

    assert!(handle.is_aborted());
    assert!(result.unwrap_err().is_secondary());
}
