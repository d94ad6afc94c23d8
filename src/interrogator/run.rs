//! Per-invocation bookkeeping: outstanding command count, first failure, phase.

use core::cell::Cell;

use bt_hci::param::ConnHandle;

use crate::{InterrogationError, PeerId};

/// Phase of an interrogation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum RunState {
    Idle,
    AwaitingMandatoryQueries,
    AwaitingExtendedFeatures(u8),
    Complete,
}

/// State shared by the queries of one run
///
/// All queries of a run are polled from the same task, so plain `Cell`s are
/// enough: no two completions of one run are ever handled at the same time.
///
/// The run's result is the first recorded failure. The pending count and the
/// phase are diagnostics: they feed logs and a debug assertion that every
/// issued query completed, but never decide when the run ends.
pub(crate) struct InterrogationRun {
    peer_id: PeerId,
    handle: ConnHandle,
    pending: Cell<usize>,
    result: Cell<Result<(), InterrogationError>>,
    state: Cell<RunState>,
}

impl InterrogationRun {
    pub(crate) fn new(peer_id: PeerId, handle: ConnHandle) -> Self {
        Self {
            peer_id,
            handle,
            pending: Cell::new(0),
            result: Cell::new(Ok(())),
            state: Cell::new(RunState::Idle),
        }
    }

    pub(crate) fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub(crate) fn handle(&self) -> ConnHandle {
        self.handle
    }

    pub(crate) fn state(&self) -> RunState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: RunState) {
        if self.state.get() != RunState::Complete {
            self.state.set(state);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Account for one more command in flight
    pub(crate) fn issue(&self) {
        self.pending.set(self.pending.get() + 1);
    }

    /// Account for one finished command
    ///
    /// Returns `true` when this completion drained the run.
    pub(crate) fn complete(&self, outcome: Result<(), InterrogationError>) -> bool {
        if let Err(e) = outcome {
            self.record_failure(e);
        }

        let pending = self.pending.get();
        if pending == 0 {
            error!(
                "[INTERROGATOR] {} completion with nothing pending",
                self.peer_id
            );
            return false;
        }

        self.pending.set(pending - 1);
        if pending == 1 {
            self.state.set(RunState::Complete);
            true
        } else {
            false
        }
    }

    /// First failure wins; later ones are only logged
    pub(crate) fn record_failure(&self, e: InterrogationError) {
        match self.result.get() {
            Ok(()) => self.result.set(Err(e)),
            Err(first) => debug!(
                "[INTERROGATOR] {} ignoring {} after {}",
                self.peer_id, e, first
            ),
        }
    }

    pub(crate) fn result(&self) -> Result<(), InterrogationError> {
        self.result.get()
    }
}
