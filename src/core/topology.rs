//! Worker identity and row-neighbor relations.

use std::fmt;

/// Rank of the worker that loads, distributes, collects and saves the image.
pub const COORDINATOR: usize = 0;

/// Side of a tile facing a neighbor. Rank 0 holds the first image rows, so
/// `Up` points toward lower ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward the previous rank.
    Up,
    /// Toward the next rank.
    Down,
}

/// Position of a worker in the row stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The only worker; it has no neighbors.
    Single,
    /// First rows of the image; only a lower neighbor.
    Top,
    /// Last rows of the image; only an upper neighbor.
    Bottom,
    /// Neighbors on both sides.
    Interior,
}

/// Where one worker sits in the group and who its neighbors are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTopology {
    /// This worker's index.
    pub rank: usize,
    /// Number of workers in the group.
    pub size: usize,
    /// Rank owning the rows directly above, if any.
    pub upper: Option<usize>,
    /// Rank owning the rows directly below, if any.
    pub lower: Option<usize>,
}

const NO_EXCHANGES: &[Direction] = &[];
const DOWN_ONLY: &[Direction] = &[Direction::Down];
const UP_ONLY: &[Direction] = &[Direction::Up];
const UP_THEN_DOWN: &[Direction] = &[Direction::Up, Direction::Down];
const DOWN_THEN_UP: &[Direction] = &[Direction::Down, Direction::Up];

impl WorkerTopology {
    /// Topology of `rank` in a group of `size` workers.
    pub fn new(rank: usize, size: usize) -> Self {
        debug_assert!(rank < size, "rank {} out of range for {} workers", rank, size);
        Self {
            rank,
            size,
            upper: rank.checked_sub(1),
            lower: (rank + 1 < size).then_some(rank + 1),
        }
    }

    /// Whether this worker is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    /// The neighbor on the given side.
    pub fn neighbor(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Up => self.upper,
            Direction::Down => self.lower,
        }
    }

    /// Position of this worker in the stack.
    pub fn role(&self) -> Role {
        match (self.upper, self.lower) {
            (None, None) => Role::Single,
            (None, Some(_)) => Role::Top,
            (Some(_), None) => Role::Bottom,
            (Some(_), Some(_)) => Role::Interior,
        }
    }

    /// Order in which this worker exchanges halos each iteration.
    ///
    /// Edge workers talk to their single neighbor. Interior workers alternate
    /// by rank parity, which pairs every blocking exchange with a partner that
    /// is waiting on the same pair and rules out a circular wait.
    pub fn exchange_order(&self) -> &'static [Direction] {
        match self.role() {
            Role::Single => NO_EXCHANGES,
            Role::Top => DOWN_ONLY,
            Role::Bottom => UP_ONLY,
            Role::Interior if self.rank % 2 == 0 => UP_THEN_DOWN,
            Role::Interior => DOWN_THEN_UP,
        }
    }
}

impl fmt::Display for WorkerTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}/{}", self.rank, self.size)
    }
}
