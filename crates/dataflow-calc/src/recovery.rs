//! Stale-file recovery around a batch.
//!
//! The orchestrator itself never retries. A caller that wants the standard
//! recovery path uses [`Calculator::calculate_with_recovery`], which reruns
//! a completed batch once with refreshed modification times when any of
//! its requests was rejected as stale.

use dataflow_core::CalculationRequest;

use crate::cancel::CancelToken;
use crate::orchestrator::{BatchEvent, BatchOutcome, BatchState, Calculator};
use crate::service::{CalculationService, ModificationTimeSource};

impl<S, M> Calculator<S, M>
where
    S: CalculationService,
    M: ModificationTimeSource,
{
    /// Runs `requests`; if the batch completes with a staleness failure,
    /// refreshes file times and runs the whole batch one more time.
    pub async fn calculate_with_recovery<F>(
        &self,
        requests: &[CalculationRequest],
        no_block: bool,
        cancel: &CancelToken,
        mut on_event: F,
    ) -> BatchOutcome
    where
        F: FnMut(BatchEvent),
    {
        let first = self
            .calculate(requests, false, no_block, cancel, &mut on_event)
            .await;
        if first.state != BatchState::Completed || !first.stale() {
            return first;
        }

        tracing::info!(
            batch = %first.batch,
            "stale file times reported; refreshing and resubmitting"
        );
        self.calculate(requests, true, no_block, cancel, &mut on_event)
            .await
    }
}
