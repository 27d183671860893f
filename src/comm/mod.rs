//! Communication backend abstraction for the worker group.
//!
//! Every collective the engine needs is expressed through the
//! [`Communicator`] trait so the same worker logic runs over any transport.
//! [`local`] provides an in-process group where each worker is a thread.

pub mod local;

use crate::core::error::TransportError;
use crate::core::partition::PartitionPlan;
use crate::core::topology::{WorkerTopology, COORDINATOR};

pub use local::{AbortHandle, LocalCluster, LocalComm};

/// Kind of message on the wire, checked on receipt to catch protocol drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Job configuration record from the coordinator.
    Broadcast,
    /// Initial owned rows from the coordinator.
    Scatter,
    /// Boundary rows between neighbors.
    Halo,
    /// Final owned rows to the coordinator.
    Gather,
}

/// A tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// What the payload is.
    pub tag: Tag,
    /// Raw bytes.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a packet from borrowed bytes.
    pub fn new(tag: Tag, payload: &[u8]) -> Self {
        Self {
            tag,
            payload: payload.to_vec(),
        }
    }
}

/// Blocking group operations for one worker.
///
/// All methods block until the matching operation on the peer side (or on
/// every worker, for collectives) has completed. A failure anywhere should be
/// followed by [`Communicator::abort`] so that no other worker stays blocked.
pub trait Communicator: Send {
    /// This worker's index.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Send the coordinator's `payload` to every worker and return it.
    ///
    /// Only the coordinator passes `Some`.
    fn broadcast(&self, payload: Option<&[u8]>) -> Result<Vec<u8>, TransportError>;

    /// Distribute each worker's owned byte range of `image` into `owned`.
    ///
    /// Only the coordinator passes the full image.
    fn scatter_rows(
        &self,
        plan: &PartitionPlan,
        image: Option<&[u8]>,
        owned: &mut [u8],
    ) -> Result<(), TransportError>;

    /// Send `send` to `peer` and receive the peer's message into `recv`, as a
    /// single combined operation.
    fn exchange(&self, peer: usize, send: &[u8], recv: &mut [u8]) -> Result<(), TransportError>;

    /// Block until every worker has reached the barrier.
    fn barrier(&self) -> Result<(), TransportError>;

    /// Collect every worker's `owned` bytes into `image` at the plan offsets.
    ///
    /// Only the coordinator passes the output buffer.
    fn gather_rows(
        &self,
        plan: &PartitionPlan,
        owned: &[u8],
        image: Option<&mut [u8]>,
    ) -> Result<(), TransportError>;

    /// Fail every pending and future operation of the whole group.
    fn abort(&self);

    /// This worker's place in the row stack.
    fn topology(&self) -> WorkerTopology {
        WorkerTopology::new(self.rank(), self.size())
    }

    /// Whether this worker is the coordinator.
    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }
}
