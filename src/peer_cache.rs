//! Peer Cache
//!
//! Registry of known remote devices keyed by [`PeerId`]. Records are only
//! handed out as snapshots; mutation goes through [`PeerCache::update`], which
//! runs a closure under the cache lock so each field replacement is seen by
//! other readers either completely or not at all.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};
use heapless::FnvIndexMap;

use crate::{BluetoothAddress, PeerCacheError, PeerId, PeerRecord};

struct Inner<const N: usize> {
    peers: FnvIndexMap<PeerId, PeerRecord, N>,
    next_id: u64,
}

/// Registry of peer records
///
/// `N` must be a power of two (a `heapless::FnvIndexMap` requirement).
pub struct PeerCache<M: RawMutex, const N: usize> {
    inner: Mutex<M, RefCell<Inner<N>>>,
}

impl<M: RawMutex, const N: usize> PeerCache<M, N> {
    /// Create an empty cache
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                peers: FnvIndexMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Register a new peer
    ///
    /// # Errors
    /// Returns `PeerCacheError::DuplicateAddress` if the address is already known,
    /// or `PeerCacheError::Full` if there is no room left.
    pub fn new_peer(&self, address: BluetoothAddress) -> Result<PeerId, PeerCacheError> {
        self.insert_with(address, |record| record)
    }

    /// Register a new peer together with paging parameters from inquiry
    ///
    /// # Errors
    /// Same as [`PeerCache::new_peer`].
    pub fn new_peer_with_page_scan_info(
        &self,
        address: BluetoothAddress,
        repetition_mode: u8,
        clock_offset: u16,
    ) -> Result<PeerId, PeerCacheError> {
        self.insert_with(address, |record| {
            record.with_page_scan_info(repetition_mode, clock_offset)
        })
    }

    fn insert_with(
        &self,
        address: BluetoothAddress,
        build: impl FnOnce(PeerRecord) -> PeerRecord,
    ) -> Result<PeerId, PeerCacheError> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.peers.values().any(|peer| peer.address() == address) {
                return Err(PeerCacheError::DuplicateAddress);
            }

            let id = PeerId(inner.next_id);
            inner
                .peers
                .insert(id, build(PeerRecord::new(id, address)))
                .map_err(|_| PeerCacheError::Full)?;
            inner.next_id += 1;

            debug!("[PEER CACHE] Added {} for {}", id, address);
            Ok(id)
        })
    }

    /// Snapshot of a peer record
    #[must_use]
    pub fn peer(&self, id: PeerId) -> Option<PeerRecord> {
        self.inner.lock(|inner| inner.borrow().peers.get(&id).cloned())
    }

    /// Look up a peer by device address
    #[must_use]
    pub fn find_by_address(&self, address: BluetoothAddress) -> Option<PeerId> {
        self.inner.lock(|inner| {
            inner
                .borrow()
                .peers
                .values()
                .find(|peer| peer.address() == address)
                .map(PeerRecord::id)
        })
    }

    /// Whether the peer exists
    #[must_use]
    pub fn contains(&self, id: PeerId) -> bool {
        self.inner
            .lock(|inner| inner.borrow().peers.contains_key(&id))
    }

    /// Apply `f` to a peer record under the cache lock
    ///
    /// Returns `None` if the peer does not exist.
    pub fn update<R>(&self, id: PeerId, f: impl FnOnce(&mut PeerRecord) -> R) -> Option<R> {
        self.inner
            .lock(|inner| inner.borrow_mut().peers.get_mut(&id).map(f))
    }

    /// Remove a peer, returning its last record
    pub fn remove(&self, id: PeerId) -> Option<PeerRecord> {
        let removed = self
            .inner
            .lock(|inner| inner.borrow_mut().peers.remove(&id));
        if removed.is_some() {
            debug!("[PEER CACHE] Removed {}", id);
        }
        removed
    }

    /// Number of known peers
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock(|inner| inner.borrow().peers.len())
    }

    /// Whether no peers are known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: RawMutex, const N: usize> Default for PeerCache<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
