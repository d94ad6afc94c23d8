//! Extended feature pages
//!
//! Pages are read one at a time starting at page 1. Each completion reports the
//! highest page the peer supports, which decides whether another page follows.

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::Interrogator;
use super::run::{InterrogationRun, RunState};
use crate::constants::MAX_FEATURE_PAGE;
use crate::event::decode_extended_features;
use crate::{CommandDispatcher, InterrogationCommand};

impl<M: RawMutex, D: CommandDispatcher, const N: usize> Interrogator<'_, M, D, N> {
    /// Read pages 1.. until the peer's last page, the configured limit or the first failure
    ///
    /// The caller has already accounted for page 1 in the run.
    pub(super) async fn read_extended_features(&self, run: &InterrogationRun) {
        let handle = run.handle();
        let limit = self.options.max_extended_page.min(MAX_FEATURE_PAGE);
        let mut page_number = 1;

        loop {
            run.set_state(RunState::AwaitingExtendedFeatures(page_number));
            let outcome = self
                .query(
                    InterrogationCommand::ReadRemoteExtendedFeatures {
                        handle,
                        page_number,
                    },
                    |event| decode_extended_features(event, handle, page_number),
                )
                .await
                .and_then(|page| {
                    self.merge(run, |record| {
                        record.set_feature_page(page.page_number, page.features);
                        record.set_last_page_number(page.max_page_number);
                    })?;
                    Ok(page.max_page_number)
                });

            match outcome {
                Ok(max_page_number) if page_number < max_page_number.min(limit) => {
                    debug!(
                        "[INTERROGATOR] {} page {} of {} read",
                        run.peer_id(),
                        page_number,
                        max_page_number
                    );
                    run.issue();
                    self.finish_query(run, "extended features", Ok(()));
                    page_number += 1;
                }
                outcome => {
                    self.finish_query(run, "extended features", outcome.map(|_| ()));
                    return;
                }
            }
        }
    }
}
