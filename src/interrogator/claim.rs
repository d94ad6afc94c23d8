//! Per-peer run bookkeeping
//!
//! Every peer with a run in flight (or a run waiting to supersede one) holds a
//! claim on one of `N` lanes. A lane is never shared between peers, so a run
//! only ever waits for an older run of the same peer. Cancellation is recorded
//! in the claim by generation; the lane's signal wakes the run to notice it.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex as BlockingMutex, raw::RawMutex};
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use heapless::FnvIndexMap;

use crate::{InterrogationError, PeerId};

struct Lane<M: RawMutex> {
    lock: Mutex<M, ()>,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> Lane<M> {
    const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            wake: Signal::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    lane: usize,
    /// Generation of the newest run
    generation: u64,
    /// Runs at or below this generation are cancelled
    cancelled: u64,
    /// Tickets alive for this peer
    holders: usize,
}

pub(super) struct Claims<M: RawMutex, const N: usize> {
    entries: BlockingMutex<M, RefCell<FnvIndexMap<PeerId, Entry, N>>>,
    lanes: [Lane<M>; N],
}

impl<M: RawMutex, const N: usize> Claims<M, N> {
    pub(super) const fn new() -> Self {
        Self {
            entries: BlockingMutex::new(RefCell::new(FnvIndexMap::new())),
            lanes: [const { Lane::new() }; N],
        }
    }

    /// Claim the peer's lane for a new run, cancelling any older run of the peer
    ///
    /// Fails with `Busy` when every lane belongs to another peer.
    pub(super) fn claim(&self, peer_id: PeerId) -> Result<Ticket<'_, M, N>, InterrogationError> {
        let (lane, generation, superseding) = self
            .entries
            .lock(|entries| {
                let mut entries = entries.borrow_mut();
                if let Some(entry) = entries.get_mut(&peer_id) {
                    entry.cancelled = entry.generation;
                    entry.generation += 1;
                    entry.holders += 1;
                    return Some((entry.lane, entry.generation, true));
                }

                let lane = (0..N).find(|lane| entries.values().all(|entry| entry.lane != *lane))?;
                let entry = Entry {
                    lane,
                    generation: 1,
                    cancelled: 0,
                    holders: 1,
                };
                entries.insert(peer_id, entry).ok()?;
                Some((lane, 1, false))
            })
            .ok_or(InterrogationError::Busy)?;

        if superseding {
            info!("[INTERROGATOR] Superseding running interrogation of {}", peer_id);
            self.lanes[lane].wake.signal(());
        }

        Ok(Ticket {
            claims: self,
            peer_id,
            lane,
            generation,
        })
    }

    /// Cancel every run of `peer_id` claimed so far
    pub(super) fn cancel(&self, peer_id: PeerId) -> bool {
        let lane = self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            let entry = entries.get_mut(&peer_id)?;
            entry.cancelled = entry.generation;
            Some(entry.lane)
        });

        match lane {
            Some(lane) => {
                self.lanes[lane].wake.signal(());
                true
            }
            None => false,
        }
    }

    pub(super) fn contains(&self, peer_id: PeerId) -> bool {
        self.entries
            .lock(|entries| entries.borrow().contains_key(&peer_id))
    }

    fn release(&self, peer_id: PeerId) {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            let done = entries.get_mut(&peer_id).is_some_and(|entry| {
                entry.holders -= 1;
                entry.holders == 0
            });
            if done {
                entries.remove(&peer_id);
            }
        });
    }
}

/// One run's hold on its peer's lane, released on drop
pub(super) struct Ticket<'a, M: RawMutex, const N: usize> {
    claims: &'a Claims<M, N>,
    peer_id: PeerId,
    lane: usize,
    generation: u64,
}

impl<'a, M: RawMutex, const N: usize> Ticket<'a, M, N> {
    /// Wait until older runs of the same peer have left the lane
    pub(super) async fn enter(&self) -> MutexGuard<'a, M, ()> {
        self.claims.lanes[self.lane].lock.lock().await
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.claims.entries.lock(|entries| {
            entries
                .borrow()
                .get(&self.peer_id)
                .is_some_and(|entry| entry.cancelled >= self.generation)
        })
    }

    /// Resolves once this run is cancelled or superseded
    pub(super) async fn cancelled(&self) {
        // The signal only wakes; the entry decides
        while !self.is_cancelled() {
            self.claims.lanes[self.lane].wake.wait().await;
        }
    }
}

impl<M: RawMutex, const N: usize> Drop for Ticket<'_, M, N> {
    fn drop(&mut self) {
        self.claims.release(self.peer_id);
    }
}
