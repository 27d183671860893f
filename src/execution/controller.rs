//! The exchange-compute-swap-barrier loop run by every worker.

use crate::comm::Communicator;
use crate::core::error::TransportError;
use crate::core::kernel::{self, Kernel};
use crate::core::tile::Tile;
use crate::core::topology::WorkerTopology;
use crate::execution::exchange::exchange_halos;
use crate::execution::progress::ProgressTracker;
use std::time::{Duration, Instant};

/// Step of an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Refreshing halos from the neighbors.
    Exchanging,
    /// Applying the kernel into the spare tile.
    Computing,
    /// Making the computed tile current.
    Swapping,
    /// Waiting for the whole group.
    Barrier,
    /// All iterations finished.
    Done,
}

/// Per-worker counters collected while iterating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    /// Worker rank.
    pub rank: usize,
    /// Iterations that passed the barrier.
    pub iterations_completed: u32,
    /// Halo exchanges performed.
    pub exchanges: usize,
    /// Time spent applying the kernel.
    pub compute_time: Duration,
    /// Time spent exchanging halos and waiting at barriers.
    pub communication_time: Duration,
}

/// Drives one worker through its iterations.
///
/// Each iteration runs every phase in order regardless of the worker's role,
/// so collective operations line up across the group.
pub struct IterationController<'a, C: Communicator + ?Sized> {
    comm: &'a C,
    topology: WorkerTopology,
    kernel: &'a Kernel,
    iterations: u32,
    current: Tile,
    next: Tile,
    phase: Phase,
    iteration_start: Instant,
    stats: WorkerStats,
    progress: Option<&'a ProgressTracker>,
}

impl<'a, C: Communicator + ?Sized> IterationController<'a, C> {
    /// Create a controller over two tiles of the same shape. `current` holds
    /// the scattered rows.
    pub fn new(comm: &'a C, kernel: &'a Kernel, iterations: u32, current: Tile, next: Tile) -> Self {
        debug_assert!(current.same_shape(&next), "tiles differ in shape");
        let topology = comm.topology();
        Self {
            comm,
            topology,
            kernel,
            iterations,
            current,
            next,
            phase: if iterations == 0 {
                Phase::Done
            } else {
                Phase::Exchanging
            },
            iteration_start: Instant::now(),
            stats: WorkerStats {
                rank: topology.rank,
                ..WorkerStats::default()
            },
            progress: None,
        }
    }

    /// Report completed iterations to `tracker`. Only the coordinator's
    /// controller should be given one.
    pub fn with_progress(mut self, tracker: Option<&'a ProgressTracker>) -> Self {
        self.progress = tracker;
        self
    }

    /// The phase the next call to [`step`](Self::step) will run.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Counters so far.
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// The tile holding the latest owned rows.
    pub fn current(&self) -> &Tile {
        &self.current
    }

    /// Run the pending phase and advance. Returns the new pending phase.
    pub fn step(&mut self) -> Result<Phase, TransportError> {
        self.phase = match self.phase {
            Phase::Exchanging => {
                self.iteration_start = Instant::now();
                let started = Instant::now();
                self.stats.exchanges += exchange_halos(self.comm, &self.topology, &mut self.current)?;
                self.stats.communication_time += started.elapsed();
                Phase::Computing
            }
            Phase::Computing => {
                let started = Instant::now();
                kernel::apply(&mut self.next, &self.current, self.kernel);
                self.stats.compute_time += started.elapsed();
                Phase::Swapping
            }
            Phase::Swapping => {
                std::mem::swap(&mut self.current, &mut self.next);
                Phase::Barrier
            }
            Phase::Barrier => {
                let started = Instant::now();
                self.comm.barrier()?;
                self.stats.communication_time += started.elapsed();
                self.stats.iterations_completed += 1;

                log::debug!(
                    "{}: iteration {}/{} done",
                    self.topology,
                    self.stats.iterations_completed,
                    self.iterations
                );
                if let Some(tracker) = self.progress {
                    tracker.iteration_completed(self.iteration_start.elapsed().as_millis() as u64);
                }

                if self.stats.iterations_completed < self.iterations {
                    Phase::Exchanging
                } else {
                    Phase::Done
                }
            }
            Phase::Done => Phase::Done,
        };
        Ok(self.phase)
    }

    /// Run every remaining phase and return the final tile with the counters.
    pub fn run(mut self) -> Result<(Tile, WorkerStats), TransportError> {
        while self.phase != Phase::Done {
            self.step()?;
        }
        Ok((self.current, self.stats))
    }
}
