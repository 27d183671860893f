//! The program every worker runs.

use crate::comm::Communicator;
use crate::core::config::JobConfig;
use crate::core::error::{AllocationError, ConfigError, StencilError, TransportError};
use crate::core::tile::Tile;
use crate::execution::controller::{IterationController, WorkerStats};
use crate::execution::progress::ProgressTracker;
use image::RgbaImage;

/// What a worker hands back when it finishes.
#[derive(Debug)]
pub struct WorkerOutput {
    /// The gathered image; only the coordinator has one.
    pub image: Option<RgbaImage>,
    /// Counters from the iteration loop.
    pub stats: WorkerStats,
}

/// Run one worker's share of a job.
///
/// The coordinator passes the job and the input image; every other worker
/// passes `None` for both and receives the job by broadcast. The sequence is
/// broadcast, plan, allocate, scatter, iterate, gather. Any error is returned
/// as-is; the caller is responsible for aborting the group.
pub fn run_worker<C: Communicator + ?Sized>(
    comm: &C,
    job: Option<&JobConfig>,
    input: Option<&RgbaImage>,
    progress: Option<&ProgressTracker>,
) -> Result<WorkerOutput, StencilError> {
    let topology = comm.topology();
    let coordinator = topology.is_coordinator();

    let record = if coordinator {
        Some(job.ok_or(ConfigError::MissingJob)?.encode()?)
    } else {
        None
    };
    let record = comm.broadcast(record.as_deref())?;
    let job = JobConfig::decode(&record)?;
    log::debug!("{}: received job {} x{}", topology, job.image, job.iterations);

    let plan = job.plan(topology.size)?;
    let span = *plan.span(topology.rank).ok_or(TransportError::InvalidPeer {
        peer: topology.rank,
        size: plan.worker_count(),
    })?;

    let radius = job.kernel.radius();
    let width = job.image.width;
    let mut current = Tile::allocate(width, span.row_count, radius)?.with_neighbors(&topology);
    let next = Tile::allocate(width, span.row_count, radius)?.with_neighbors(&topology);

    let root_image = match (coordinator, input) {
        (true, Some(image)) => {
            job.image.check(image)?;
            Some(image.as_raw().as_slice())
        }
        (true, None) => return Err(TransportError::MissingRootData("the input image").into()),
        (false, _) => None,
    };
    comm.scatter_rows(&plan, root_image, current.owned_mut())?;
    log::debug!(
        "{}: owns rows {}..{}",
        topology,
        span.row_start,
        span.row_end()
    );

    let tracker = if coordinator { progress } else { None };
    let (tile, stats) = IterationController::new(comm, &job.kernel, job.iterations, current, next)
        .with_progress(tracker)
        .run()?;

    let image = if coordinator {
        let bytes = job.image.byte_len();
        let mut out = Vec::new();
        out.try_reserve_exact(bytes).map_err(|_| AllocationError {
            bytes,
            purpose: "output image",
        })?;
        out.resize(bytes, 0);
        comm.gather_rows(&plan, tile.owned(), Some(&mut out))?;
        Some(job.image.wrap(out)?)
    } else {
        comm.gather_rows(&plan, tile.owned(), None)?;
        None
    };

    log::debug!(
        "{}: finished ({} exchanges, compute {:?}, communication {:?})",
        topology,
        stats.exchanges,
        stats.compute_time,
        stats.communication_time
    );
    Ok(WorkerOutput { image, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::Kernel;
    use crate::core::types::ImageDescriptor;
    use crate::execution::exchange::tests::RecordingComm;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 20) as u8, (y * 20) as u8, 7, 255])
        })
    }

    #[test]
    fn test_single_worker_identity() {
        let comm = RecordingComm::new(0, 1);
        let image = gradient(5, 4);
        let job = JobConfig::new(ImageDescriptor::of(&image), Kernel::identity(3).unwrap(), 2);

        let output = run_worker(&comm, Some(&job), Some(&image), None).unwrap();
        assert_eq!(output.image, Some(image));
        assert_eq!(output.stats.iterations_completed, 2);
    }

    #[test]
    fn test_coordinator_requires_job_and_image() {
        let comm = RecordingComm::new(0, 1);
        let image = gradient(2, 2);
        assert!(matches!(
            run_worker(&comm, None, Some(&image), None),
            Err(StencilError::Config(ConfigError::MissingJob))
        ));

        let job = JobConfig::new(ImageDescriptor::of(&image), Kernel::identity(1).unwrap(), 1);
        assert!(matches!(
            run_worker(&comm, Some(&job), None, None),
            Err(StencilError::Transport(TransportError::MissingRootData(_)))
        ));
    }

    #[test]
    fn test_image_must_match_job() {
        let comm = RecordingComm::new(0, 1);
        let job = JobConfig::new(ImageDescriptor::new(3, 3), Kernel::identity(1).unwrap(), 1);
        assert!(matches!(
            run_worker(&comm, Some(&job), Some(&gradient(4, 3)), None),
            Err(StencilError::Config(ConfigError::ImageMismatch { .. }))
        ));
    }
}
