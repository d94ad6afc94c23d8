//! BR/EDR Peer Interrogation
//!
//! Once a baseband connection is up, the host asks the remote device for its
//! name, its Link Manager version and its LMP feature pages before profiles are
//! allowed to use the link.
//!
//! ## Procedure
//!
//! 1. Remote Name Request, Read Remote Version Information and Read Remote
//!    Supported Features are issued back to back and complete in any order.
//! 2. When page 0 of the feature mask sets the extended features bit, pages
//!    1.. are read one at a time. Each page reports the highest page the device
//!    supports, so page `n + 1` is only requested after page `n` succeeded.
//! 3. Every decoded result is merged into the [`PeerCache`] as soon as it
//!    arrives. A failed query never aborts its siblings; the run reports the
//!    first failure it saw once every query has finished, and whatever was
//!    merged before stays in the cache.
//!
//! ## Runs
//!
//! At most one run per peer is in flight. Starting a peer that is already being
//! interrogated cancels the older run (its result is
//! [`InterrogationError::Canceled`]) and then starts afresh. Runs of different
//! peers never wait on each other.
//!
//! There are no timeouts here. A command that never completes keeps its run
//! pending until the dispatcher fails it or the connection owner calls
//! [`Interrogator::cancel`].

mod claim;
mod extended;
mod run;

use bt_hci::param::ConnHandle;
use embassy_futures::join::join3;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::constants::{CLOCK_OFFSET_VALID_FLAG, NO_CLOCK_OFFSET};
use crate::event::{decode_remote_name, decode_remote_version, decode_supported_features};
use crate::{
    CommandDispatcher, EventPacket, InterrogationCommand, InterrogationError, InterrogatorOptions,
    LmpFeature, PeerCache, PeerId, PeerRecord,
};
use claim::Claims;
use run::{InterrogationRun, RunState};

/// Remote name, version and page 0 features
const MANDATORY_QUERIES: usize = 3;

/// Interrogates connected BR/EDR peers and records the results
///
/// `M` is the raw mutex shared with the [`PeerCache`], `D` the HCI command
/// dispatcher and `N` the peer cache capacity, which also bounds the number of
/// peers interrogated at once.
pub struct Interrogator<'d, M: RawMutex, D: CommandDispatcher, const N: usize> {
    peers: &'d PeerCache<M, N>,
    dispatcher: &'d D,
    options: InterrogatorOptions,
    claims: Claims<M, N>,
}

impl<'d, M: RawMutex, D: CommandDispatcher, const N: usize> Interrogator<'d, M, D, N> {
    /// Create an interrogator over a peer cache and a command dispatcher
    #[must_use]
    pub const fn new(
        peers: &'d PeerCache<M, N>,
        dispatcher: &'d D,
        options: InterrogatorOptions,
    ) -> Self {
        Self {
            peers,
            dispatcher,
            options,
            claims: Claims::new(),
        }
    }

    /// Get a reference to the options
    #[must_use]
    pub fn options(&self) -> &InterrogatorOptions {
        &self.options
    }

    /// Interrogate `peer_id` over `handle` and report the aggregate result to `callback`
    ///
    /// `callback` runs exactly once, after every query of the run has finished
    /// (or the run was cancelled). Partial results are merged into the peer
    /// cache even when the run fails.
    pub async fn start(
        &self,
        peer_id: PeerId,
        handle: ConnHandle,
        callback: impl FnOnce(Result<(), InterrogationError>),
    ) {
        let result = self.interrogate(peer_id, handle).await;
        callback(result);
    }

    /// Interrogate `peer_id` over `handle`
    ///
    /// # Errors
    ///
    /// Returns the first failure observed by any query of the run:
    /// - `InterrogationError::Dispatch` if a command could not be sent or was rejected
    /// - `InterrogationError::Controller` if a completion event carried a failure status
    /// - `InterrogationError::Malformed` if a completion event could not be decoded
    /// - `InterrogationError::PeerNotFound` if the peer is unknown or was removed mid-run
    /// - `InterrogationError::Canceled` if the run was cancelled or superseded
    /// - `InterrogationError::Busy` if `N` other peers are being interrogated
    pub async fn interrogate(
        &self,
        peer_id: PeerId,
        handle: ConnHandle,
    ) -> Result<(), InterrogationError> {
        if !self.peers.contains(peer_id) {
            warn!("[INTERROGATOR] Unknown {}", peer_id);
            return Err(InterrogationError::PeerNotFound);
        }

        let ticket = self.claims.claim(peer_id)?;
        let _lane = ticket.enter().await;
        if ticket.is_cancelled() {
            info!("[INTERROGATOR] {} superseded before it started", peer_id);
            return Err(InterrogationError::Canceled);
        }

        // The record may have changed (or gone) while waiting for the lane
        let Some(peer) = self.peers.peer(peer_id) else {
            warn!("[INTERROGATOR] {} removed before interrogation", peer_id);
            return Err(InterrogationError::PeerNotFound);
        };

        let run = InterrogationRun::new(peer_id, handle);
        match select(self.drive(&run, &peer), ticket.cancelled()).await {
            Either::First(result) => result,
            Either::Second(()) => {
                info!(
                    "[INTERROGATOR] {} cancelled in {} with {} queries pending",
                    peer_id,
                    run.state(),
                    run.pending()
                );
                Err(InterrogationError::Canceled)
            }
        }
    }

    /// Cancel the run in flight for `peer_id`
    ///
    /// The run's outstanding commands are dropped and it completes with
    /// [`InterrogationError::Canceled`]. Call this when the connection goes
    /// down and the dispatcher cannot fail the outstanding commands itself.
    /// Runs of other peers are not affected. Returns `false` if no run was in
    /// flight for the peer.
    pub fn cancel(&self, peer_id: PeerId) -> bool {
        self.claims.cancel(peer_id)
    }

    /// Whether a run is in flight for `peer_id`
    #[must_use]
    pub fn is_interrogating(&self, peer_id: PeerId) -> bool {
        self.claims.contains(peer_id)
    }

    async fn drive(
        &self,
        run: &InterrogationRun,
        peer: &PeerRecord,
    ) -> Result<(), InterrogationError> {
        info!(
            "[INTERROGATOR] Interrogating {} ({}) on handle {}",
            run.peer_id(),
            peer.address(),
            run.handle().raw()
        );

        run.set_state(RunState::AwaitingMandatoryQueries);
        for _ in 0..MANDATORY_QUERIES {
            run.issue();
        }
        join3(
            self.read_name(run, peer),
            self.read_version(run),
            self.read_features(run),
        )
        .await;
        debug_assert_eq!(run.pending(), 0, "every issued query must complete");

        let result = run.result();
        match result {
            Ok(()) => info!("[INTERROGATOR] {} interrogation complete", run.peer_id()),
            Err(e) => warn!(
                "[INTERROGATOR] {} interrogation failed: {}",
                run.peer_id(),
                e
            ),
        }
        result
    }

    async fn read_name(&self, run: &InterrogationRun, peer: &PeerRecord) {
        let address = peer.address();
        let command = InterrogationCommand::RemoteNameRequest {
            bd_addr: address,
            page_scan_repetition_mode: peer
                .page_scan_repetition_mode()
                .unwrap_or(self.options.page_scan_repetition_mode),
            clock_offset: peer
                .clock_offset()
                .map_or(NO_CLOCK_OFFSET, |offset| offset | CLOCK_OFFSET_VALID_FLAG),
        };

        let outcome = self
            .query(command, |event| decode_remote_name(event, address))
            .await
            .and_then(|name| self.merge(run, |record| record.set_name(name)));
        self.finish_query(run, "name", outcome);
    }

    async fn read_version(&self, run: &InterrogationRun) {
        let handle = run.handle();
        let outcome = self
            .query(
                InterrogationCommand::ReadRemoteVersionInformation { handle },
                |event| decode_remote_version(event, handle),
            )
            .await
            .and_then(|version| self.merge(run, |record| record.set_version(version)));
        self.finish_query(run, "version", outcome);
    }

    async fn read_features(&self, run: &InterrogationRun) {
        let handle = run.handle();
        let outcome = self
            .query(
                InterrogationCommand::ReadRemoteSupportedFeatures { handle },
                |event| decode_supported_features(event, handle),
            )
            .await
            .and_then(|bits| {
                self.merge(run, |record| record.set_feature_page(0, bits))?;
                Ok(bits)
            });

        match outcome {
            Ok(bits) if self.wants_extended_features(bits) => {
                // Page 1 is counted before page 0 completes so the run cannot drain in between
                run.issue();
                self.finish_query(run, "features", Ok(()));
                self.read_extended_features(run).await;
            }
            outcome => self.finish_query(run, "features", outcome.map(|_| ())),
        }
    }

    fn wants_extended_features(&self, page_zero: u64) -> bool {
        self.options.read_extended_features
            && self.options.max_extended_page > 0
            && page_zero & (1 << LmpFeature::EXTENDED_FEATURES.bit) != 0
    }

    async fn query<T>(
        &self,
        command: InterrogationCommand,
        decode: impl FnOnce(&EventPacket) -> Result<T, InterrogationError>,
    ) -> Result<T, InterrogationError> {
        trace!("[INTERROGATOR] Sending opcode {:#x}", command.opcode());
        let event = self.dispatcher.send_command(command).await?;
        decode(&event)
    }

    /// Apply one decoded result to the peer record as a single replacement
    fn merge(
        &self,
        run: &InterrogationRun,
        apply: impl FnOnce(&mut PeerRecord),
    ) -> Result<(), InterrogationError> {
        self.peers
            .update(run.peer_id(), apply)
            .ok_or(InterrogationError::PeerNotFound)
    }

    fn finish_query(
        &self,
        run: &InterrogationRun,
        query: &'static str,
        outcome: Result<(), InterrogationError>,
    ) {
        match outcome {
            Ok(()) => debug!("[INTERROGATOR] {} {} query done", run.peer_id(), query),
            Err(e) => warn!(
                "[INTERROGATOR] {} {} query failed: {}",
                run.peer_id(),
                query,
                e
            ),
        }
        if run.complete(outcome) {
            debug!("[INTERROGATOR] {} all queries finished", run.peer_id());
        }
    }
}
