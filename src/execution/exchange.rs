//! Per-iteration halo exchange between row neighbors.

use crate::comm::Communicator;
use crate::core::error::TransportError;
use crate::core::tile::Tile;
use crate::core::topology::{Direction, WorkerTopology};

/// Exchange boundary rows with the neighbor on one side.
///
/// Sends this tile's `radius` boundary rows toward `direction` and stores the
/// neighbor's rows in the halo on that side, as one combined operation.
/// Returns `false` without communicating when there is no neighbor there.
pub fn exchange_direction<C: Communicator + ?Sized>(
    comm: &C,
    topology: &WorkerTopology,
    tile: &mut Tile,
    direction: Direction,
) -> Result<bool, TransportError> {
    let Some(peer) = topology.neighbor(direction) else {
        return Ok(false);
    };
    let (boundary, halo) = tile.exchange_slots(direction);
    comm.exchange(peer, boundary, halo)?;
    Ok(true)
}

/// Refresh both halos of `tile` in this worker's deadlock-free order.
///
/// Returns the number of exchanges performed: 0 for a lone worker, 1 at the
/// image edges and 2 for interior workers. A zero-radius tile still goes
/// through every exchange, with empty payloads.
pub fn exchange_halos<C: Communicator + ?Sized>(
    comm: &C,
    topology: &WorkerTopology,
    tile: &mut Tile,
) -> Result<usize, TransportError> {
    let mut exchanges = 0;
    for &direction in topology.exchange_order() {
        if exchange_direction(comm, topology, tile, direction)? {
            exchanges += 1;
        }
    }
    Ok(exchanges)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::comm::LocalCluster;
    use crate::core::partition::PartitionPlan;
    use std::cell::RefCell;
    use std::thread;

    /// Records exchange calls and answers with a fixed byte. Scatter and
    /// gather only move this worker's own span.
    pub(crate) struct RecordingComm {
        pub rank: usize,
        pub size: usize,
        pub calls: RefCell<Vec<(usize, usize)>>,
    }

    impl RecordingComm {
        pub fn new(rank: usize, size: usize) -> Self {
            Self {
                rank,
                size,
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn peers(&self) -> Vec<usize> {
            self.calls.borrow().iter().map(|&(peer, _)| peer).collect()
        }
    }

    impl Communicator for RecordingComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn broadcast(&self, payload: Option<&[u8]>) -> Result<Vec<u8>, TransportError> {
            payload
                .map(<[u8]>::to_vec)
                .ok_or(TransportError::MissingRootData("a broadcast payload"))
        }

        fn scatter_rows(
            &self,
            plan: &PartitionPlan,
            image: Option<&[u8]>,
            owned: &mut [u8],
        ) -> Result<(), TransportError> {
            if let (Some(image), Some(span)) = (image, plan.span(self.rank)) {
                owned.copy_from_slice(&image[span.byte_offset..span.byte_end()]);
            }
            Ok(())
        }

        fn exchange(&self, peer: usize, send: &[u8], recv: &mut [u8]) -> Result<(), TransportError> {
            self.calls.borrow_mut().push((peer, send.len()));
            recv.fill(peer as u8 + 100);
            Ok(())
        }

        fn barrier(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn gather_rows(
            &self,
            plan: &PartitionPlan,
            owned: &[u8],
            image: Option<&mut [u8]>,
        ) -> Result<(), TransportError> {
            if let (Some(image), Some(span)) = (image, plan.span(self.rank)) {
                image[span.byte_offset..span.byte_end()].copy_from_slice(owned);
            }
            Ok(())
        }

        fn abort(&self) {}
    }

    fn exchange_on(rank: usize, size: usize, radius: usize) -> (RecordingComm, Tile, usize) {
        let comm = RecordingComm::new(rank, size);
        let topology = comm.topology();
        let mut tile = Tile::allocate(2, 4, radius)
            .unwrap()
            .with_neighbors(&topology);
        let count = exchange_halos(&comm, &topology, &mut tile).unwrap();
        (comm, tile, count)
    }

    #[test]
    fn test_single_worker_never_exchanges() {
        let (comm, _, count) = exchange_on(0, 1, 1);
        assert_eq!(count, 0);
        assert!(comm.peers().is_empty());
    }

    #[test]
    fn test_edge_workers_exchange_once() {
        let (top, tile, count) = exchange_on(0, 4, 1);
        assert_eq!(count, 1);
        assert_eq!(top.peers(), vec![1]);
        assert!(tile.halo(Direction::Down).iter().all(|&b| b == 101));
        assert!(tile.halo(Direction::Up).iter().all(|&b| b == 0));

        let (bottom, tile, count) = exchange_on(3, 4, 1);
        assert_eq!(count, 1);
        assert_eq!(bottom.peers(), vec![2]);
        assert!(tile.halo(Direction::Up).iter().all(|&b| b == 102));
    }

    #[test]
    fn test_interior_workers_follow_parity() {
        let (even, _, count) = exchange_on(2, 4, 1);
        assert_eq!(count, 2);
        assert_eq!(even.peers(), vec![1, 3]);

        let (odd, _, count) = exchange_on(1, 4, 1);
        assert_eq!(count, 2);
        assert_eq!(odd.peers(), vec![2, 0]);
    }

    #[test]
    fn test_payload_is_radius_rows() {
        let (comm, _, _) = exchange_on(1, 3, 2);
        assert!(comm.calls.borrow().iter().all(|&(_, len)| len == 2 * 2 * 4));
    }

    #[test]
    fn test_zero_radius_keeps_call_pattern() {
        let (comm, _, count) = exchange_on(1, 3, 0);
        assert_eq!(count, 2);
        assert_eq!(comm.calls.borrow().as_slice(), &[(2, 0), (0, 0)]);
    }

    #[test]
    fn test_halos_match_neighbor_boundaries() {
        let size = 5;
        let comms = LocalCluster::create(size).unwrap();
        let tiles: Vec<Tile> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let topology = comm.topology();
                        let mut tile = Tile::allocate(1, 3, 2)
                            .unwrap()
                            .with_neighbors(&topology);
                        let row_bytes = tile.row_bytes();
                        for (i, row) in tile.owned_mut().chunks_mut(row_bytes).enumerate() {
                            row.fill((comm.rank() * 10 + i) as u8);
                        }
                        exchange_halos(comm, &topology, &mut tile).unwrap();
                        tile
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for rank in 0..size {
            if rank > 0 {
                assert_eq!(
                    tiles[rank].halo(Direction::Up),
                    tiles[rank - 1].boundary(Direction::Down)
                );
            }
            if rank + 1 < size {
                assert_eq!(
                    tiles[rank].halo(Direction::Down),
                    tiles[rank + 1].boundary(Direction::Up)
                );
            }
        }
    }
}
