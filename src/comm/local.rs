//! In-process worker group.
//!
//! Each worker owns a [`LocalComm`]. Every ordered pair of workers is joined
//! by a zero-capacity crossbeam channel, so a send completes only when the
//! peer receives it, like a rendezvous transport. A combined exchange waits
//! on its send and its receive at the same time and completes whichever the
//! peer is ready for first.
//!
//! Aborting the group closes a shared signal channel that every blocking
//! operation also selects on, and poisons the barrier.

use crate::comm::{Communicator, Packet, Tag};
use crate::core::error::{ConfigError, TransportError};
use crate::core::partition::PartitionPlan;
use crate::core::topology::COORDINATOR;
use crossbeam::channel::{bounded, select, Receiver, Select, Sender};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Factory for in-process worker groups.
pub struct LocalCluster;

impl LocalCluster {
    /// Create the communicators of a group of `size` workers, in rank order.
    pub fn create(size: usize) -> Result<Vec<LocalComm>, ConfigError> {
        if size == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let (abort_tx, abort_rx) = bounded::<()>(0);
        let shared = Arc::new(Shared {
            barrier: GroupBarrier::new(size),
            abort_tx: Mutex::new(Some(abort_tx)),
        });

        let mut outboxes: Vec<Vec<Option<Sender<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = bounded(0);
                outboxes[src][dst] = Some(tx);
                inboxes[dst][src] = Some(rx);
            }
        }

        Ok(outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalComm {
                rank,
                size,
                outbox,
                inbox,
                abort_rx: abort_rx.clone(),
                shared: Arc::clone(&shared),
            })
            .collect())
    }
}

struct Shared {
    barrier: GroupBarrier,
    abort_tx: Mutex<Option<Sender<()>>>,
}

impl Shared {
    fn abort(&self) {
        self.barrier.abort();
        // Closing the only sender wakes every select on the abort channel.
        self.abort_tx.lock().take();
    }
}

/// Aborts a group from outside any worker.
#[derive(Clone)]
pub struct AbortHandle {
    shared: Arc<Shared>,
}

impl AbortHandle {
    /// Fail every pending and future operation of the group.
    pub fn abort(&self) {
        self.shared.abort();
    }

    /// Whether the group has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.shared.barrier.is_aborted()
    }
}

/// One worker's endpoint in an in-process group.
pub struct LocalComm {
    rank: usize,
    size: usize,
    outbox: Vec<Option<Sender<Packet>>>,
    inbox: Vec<Option<Receiver<Packet>>>,
    abort_rx: Receiver<()>,
    shared: Arc<Shared>,
}

impl LocalComm {
    /// A handle that can abort this worker's group.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn sender(&self, peer: usize) -> Result<&Sender<Packet>, TransportError> {
        self.outbox
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(TransportError::InvalidPeer {
                peer,
                size: self.size,
            })
    }

    fn receiver(&self, peer: usize) -> Result<&Receiver<Packet>, TransportError> {
        self.inbox
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(TransportError::InvalidPeer {
                peer,
                size: self.size,
            })
    }

    fn send(&self, peer: usize, packet: Packet) -> Result<(), TransportError> {
        let tx = self.sender(peer)?;
        select! {
            send(tx, packet) -> res => res.map_err(|_| TransportError::Disconnected { peer }),
            recv(self.abort_rx) -> _ => Err(TransportError::Aborted),
        }
    }

    fn recv(&self, peer: usize, tag: Tag) -> Result<Vec<u8>, TransportError> {
        let rx = self.receiver(peer)?;
        let packet = select! {
            recv(rx) -> msg => msg.map_err(|_| TransportError::Disconnected { peer })?,
            recv(self.abort_rx) -> _ => return Err(TransportError::Aborted),
        };
        check_tag(peer, tag, &packet)?;
        Ok(packet.payload)
    }

    fn recv_into(&self, peer: usize, tag: Tag, out: &mut [u8]) -> Result<(), TransportError> {
        let payload = self.recv(peer, tag)?;
        check_len(peer, out.len(), &payload)?;
        out.copy_from_slice(&payload);
        Ok(())
    }
}

fn check_tag(peer: usize, expected: Tag, packet: &Packet) -> Result<(), TransportError> {
    if packet.tag != expected {
        return Err(TransportError::UnexpectedMessage {
            peer,
            expected,
            got: packet.tag,
        });
    }
    Ok(())
}

fn check_len(peer: usize, expected: usize, payload: &[u8]) -> Result<(), TransportError> {
    if payload.len() != expected {
        return Err(TransportError::LengthMismatch {
            peer,
            expected,
            got: payload.len(),
        });
    }
    Ok(())
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, payload: Option<&[u8]>) -> Result<Vec<u8>, TransportError> {
        if self.rank != COORDINATOR {
            return self.recv(COORDINATOR, Tag::Broadcast);
        }
        let payload = payload.ok_or(TransportError::MissingRootData("a broadcast payload"))?;
        for peer in 1..self.size {
            self.send(peer, Packet::new(Tag::Broadcast, payload))?;
        }
        Ok(payload.to_vec())
    }

    fn scatter_rows(
        &self,
        plan: &PartitionPlan,
        image: Option<&[u8]>,
        owned: &mut [u8],
    ) -> Result<(), TransportError> {
        if self.rank != COORDINATOR {
            return self.recv_into(COORDINATOR, Tag::Scatter, owned);
        }

        let image = image.ok_or(TransportError::MissingRootData("the image to scatter"))?;
        check_len(COORDINATOR, plan.total_bytes(), image)?;
        for (peer, span) in plan.spans().iter().enumerate() {
            let rows = &image[span.byte_offset..span.byte_end()];
            if peer == COORDINATOR {
                check_len(peer, owned.len(), rows)?;
                owned.copy_from_slice(rows);
            } else {
                self.send(peer, Packet::new(Tag::Scatter, rows))?;
            }
        }
        Ok(())
    }

    fn exchange(&self, peer: usize, send: &[u8], recv: &mut [u8]) -> Result<(), TransportError> {
        let tx = self.sender(peer)?;
        let rx = self.receiver(peer)?;

        let mut outgoing = Some(Packet::new(Tag::Halo, send));
        let mut incoming: Option<Packet> = None;

        while outgoing.is_some() || incoming.is_none() {
            let mut sel = Select::new();
            let send_op = outgoing.as_ref().map(|_| sel.send(tx));
            let recv_op = incoming.is_none().then(|| sel.recv(rx));
            let abort_op = sel.recv(&self.abort_rx);

            let oper = sel.select();
            let index = oper.index();
            if Some(index) == send_op {
                if let Some(packet) = outgoing.take() {
                    oper.send(tx, packet)
                        .map_err(|_| TransportError::Disconnected { peer })?;
                }
            } else if Some(index) == recv_op {
                let packet = oper
                    .recv(rx)
                    .map_err(|_| TransportError::Disconnected { peer })?;
                incoming = Some(packet);
            } else {
                debug_assert_eq!(index, abort_op);
                let _ = oper.recv(&self.abort_rx);
                return Err(TransportError::Aborted);
            }
        }

        match incoming {
            Some(packet) => {
                check_tag(peer, Tag::Halo, &packet)?;
                check_len(peer, recv.len(), &packet.payload)?;
                recv.copy_from_slice(&packet.payload);
                Ok(())
            }
            None => Err(TransportError::Disconnected { peer }),
        }
    }

    fn barrier(&self) -> Result<(), TransportError> {
        self.shared.barrier.wait()
    }

    fn gather_rows(
        &self,
        plan: &PartitionPlan,
        owned: &[u8],
        image: Option<&mut [u8]>,
    ) -> Result<(), TransportError> {
        if self.rank != COORDINATOR {
            return self.send(COORDINATOR, Packet::new(Tag::Gather, owned));
        }

        let image = image.ok_or(TransportError::MissingRootData("the gather buffer"))?;
        check_len(COORDINATOR, plan.total_bytes(), image)?;
        for (peer, span) in plan.spans().iter().enumerate() {
            let rows = &mut image[span.byte_offset..span.byte_end()];
            if peer == COORDINATOR {
                check_len(peer, rows.len(), owned)?;
                rows.copy_from_slice(owned);
            } else {
                self.recv_into(peer, Tag::Gather, rows)?;
            }
        }
        Ok(())
    }

    fn abort(&self) {
        self.shared.abort();
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        // A panicking worker never reaches its error path.
        if std::thread::panicking() {
            self.shared.abort();
        }
    }
}

impl fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

/// Reusable barrier that can be poisoned to release every waiter.
struct GroupBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

impl GroupBarrier {
    fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(TransportError::Aborted);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.cvar.notify_all();
            return Ok(());
        }

        while state.generation == generation && !state.aborted {
            self.cvar.wait(&mut state);
        }
        if state.generation == generation {
            Err(TransportError::Aborted)
        } else {
            Ok(())
        }
    }

    fn abort(&self) {
        self.state.lock().aborted = true;
        self.cvar.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}
