//! The calculation orchestrator.
//!
//! [`Calculator::calculate`] runs a batch of requests strictly in order.
//! Each request is looked up in the result cache by signature first and
//! only sent to the calculation service on a miss; fresh results are
//! written back. A failed request is recorded and the batch moves on.
//!
//! Cancellation races the request in flight. Once the token is raised no
//! further request is dispatched, the in-flight future is dropped, and the
//! results gathered so far are returned with [`BatchState::Cancelled`].
//! Cache entries already written stay in place.
//!
//! ```text
//! Idle -> [RefreshingTimes] -> Running -> Completed | Cancelled | Failed
//! ```

use std::borrow::Cow;

use serde::Serialize;
use uuid::Uuid;

use dataflow_cache::{compute_signature, Signature};
use dataflow_core::{CalcResult, CalculationRequest};

use crate::cancel::CancelToken;
use crate::context::CalcContext;
use crate::error::{CalcError, RemoteError};
use crate::mtime::refresh_batch;
use crate::service::{CalculationService, ModificationTimeSource, RemoteCall};

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    RefreshingTimes,
    Running,
    Completed,
    Cancelled,
    /// The modification-time refresh failed before any request ran.
    Failed,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::Cancelled | BatchState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// Notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// `blocking` tells the UI whether to hold input until the batch ends.
    Started {
        batch: Uuid,
        total: usize,
        blocking: bool,
    },
    State { state: BatchState },
    Progress(Progress),
    SlotFailed { index: usize, message: String },
}

/// A request that produced a value.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotResult {
    /// Position of the request in the batch.
    pub index: usize,
    /// `None` when caching is disabled.
    pub signature: Option<Signature>,
    /// Served from the cache rather than the service.
    pub cached: bool,
    pub value: CalcResult,
}

/// A request that failed; the batch continued past it.
#[derive(Debug)]
pub struct SlotFailure {
    pub index: usize,
    pub error: CalcError,
}

impl SlotFailure {
    /// The service error, if the request got that far.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match &self.error {
            CalcError::Remote(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.remote_error().is_some_and(RemoteError::is_stale)
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub batch: Uuid,
    pub state: BatchState,
    pub results: Vec<SlotResult>,
    pub failures: Vec<SlotFailure>,
    /// Why the batch ended in [`BatchState::Failed`].
    pub error: Option<CalcError>,
}

impl BatchOutcome {
    fn new(batch: Uuid) -> Self {
        BatchOutcome {
            batch,
            state: BatchState::Idle,
            results: Vec::new(),
            failures: Vec::new(),
            error: None,
        }
    }

    /// Whether any request failed because of stale file times.
    pub fn stale(&self) -> bool {
        self.failures.iter().any(SlotFailure::is_stale)
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == BatchState::Cancelled
    }

    /// Result for the request at `index`, if it produced one.
    pub fn result(&self, index: usize) -> Option<&CalcResult> {
        self.results
            .iter()
            .find(|slot| slot.index == index)
            .map(|slot| &slot.value)
    }
}

/// Runs calculation batches against a service, using the context's cache.
pub struct Calculator<S, M> {
    ctx: CalcContext,
    service: S,
    mtimes: M,
}

impl<S, M> Calculator<S, M>
where
    S: CalculationService,
    M: ModificationTimeSource,
{
    pub fn new(ctx: CalcContext, service: S, mtimes: M) -> Self {
        Calculator {
            ctx,
            service,
            mtimes,
        }
    }

    pub fn context(&self) -> &CalcContext {
        &self.ctx
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Runs `requests` in order.
    ///
    /// With `recalc_mtimes`, file modification times in every request are
    /// refreshed first. With `no_block`, the batch yields to the runtime
    /// between requests and announces itself as non-blocking.
    pub async fn calculate<F>(
        &self,
        requests: &[CalculationRequest],
        recalc_mtimes: bool,
        no_block: bool,
        cancel: &CancelToken,
        mut on_event: F,
    ) -> BatchOutcome
    where
        F: FnMut(BatchEvent),
    {
        let batch = Uuid::new_v4();
        let total = requests.len();
        let mut outcome = BatchOutcome::new(batch);
        tracing::info!(%batch, total, recalc_mtimes, no_block, "calculation batch started");
        on_event(BatchEvent::Started {
            batch,
            total,
            blocking: !no_block,
        });

        let requests: Cow<'_, [CalculationRequest]> = if recalc_mtimes {
            set_state(&mut outcome, BatchState::RefreshingTimes, &mut on_event);
            match refresh_batch(requests, &self.ctx.registry, &self.mtimes, cancel).await {
                Ok(refreshed) => Cow::Owned(refreshed),
                Err(CalcError::Cancelled) => {
                    tracing::info!(%batch, "calculation batch cancelled during time refresh");
                    set_state(&mut outcome, BatchState::Cancelled, &mut on_event);
                    return outcome;
                }
                Err(err) => {
                    tracing::warn!(%batch, error = %err, "modification time refresh failed");
                    outcome.error = Some(err);
                    set_state(&mut outcome, BatchState::Failed, &mut on_event);
                    return outcome;
                }
            }
        } else {
            Cow::Borrowed(requests)
        };

        set_state(&mut outcome, BatchState::Running, &mut on_event);
        let mut cancelled = false;
        for (index, request) in requests.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                slot = self.run_one(index, request) => slot,
            };
            match slot {
                Ok(result) => outcome.results.push(result),
                Err(error) => {
                    tracing::warn!(%batch, index, error = %error, "calculation request failed");
                    on_event(BatchEvent::SlotFailed {
                        index,
                        message: error.to_string(),
                    });
                    outcome.failures.push(SlotFailure { index, error });
                }
            }
            on_event(BatchEvent::Progress(Progress {
                done: index + 1,
                total,
            }));
            if no_block {
                tokio::task::yield_now().await;
            }
        }

        let state = if cancelled {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        };
        set_state(&mut outcome, state, &mut on_event);
        tracing::info!(
            %batch,
            state = ?state,
            results = outcome.results.len(),
            failures = outcome.failures.len(),
            "calculation batch finished"
        );
        outcome
    }

    /// Evaluates one request through the cache.
    async fn run_one(
        &self,
        index: usize,
        request: &CalculationRequest,
    ) -> Result<SlotResult, CalcError> {
        let registry = &self.ctx.registry;
        let cached = match self.ctx.cache() {
            Some(cache) => {
                let signature = compute_signature(request, registry)?;
                match cache.get(&signature).await {
                    Ok(value) => {
                        tracing::debug!(index, %signature, "cache hit");
                        return Ok(SlotResult {
                            index,
                            signature: Some(signature),
                            cached: true,
                            value,
                        });
                    }
                    Err(err) if err.is_not_found() => {
                        tracing::debug!(index, %signature, "cache miss");
                    }
                    Err(err) => {
                        tracing::warn!(index, error = %err, "cache read failed; recalculating");
                    }
                }
                Some((cache, signature))
            }
            None => None,
        };

        let call = RemoteCall::from_request(request, registry);
        let value = self.service.calculate(&call).await?;

        let signature = match cached {
            Some((cache, signature)) => {
                if let Err(err) = cache.set(signature.clone(), value.clone()).await {
                    tracing::warn!(index, error = %err, "cache write failed");
                }
                Some(signature)
            }
            None => None,
        };

        Ok(SlotResult {
            index,
            signature,
            cached: false,
            value,
        })
    }
}

fn set_state<F: FnMut(BatchEvent)>(outcome: &mut BatchOutcome, state: BatchState, on_event: &mut F) {
    outcome.state = state;
    on_event(BatchEvent::State { state });
}
