//! Calculation orchestration for dataflow templates.
//!
//! Drives batches of [`CalculationRequest`](dataflow_core::CalculationRequest)s
//! through the result cache and a [`CalculationService`], with cooperative
//! cancellation, progress events, and refresh of stale file times.
//!
//! # Modules
//!
//! - [`error`]: RemoteError and CalcError
//! - [`service`]: remote seams (CalculationService, ModificationTimeSource)
//! - [`cancel`]: CancelToken
//! - [`config`]: CalcConfig read from the environment
//! - [`context`]: CalcContext holding registry, cache and config
//! - [`mtime`]: modification-time refresh
//! - [`orchestrator`]: Calculator and batch types
//! - [`recovery`]: stale-file retry around a batch

pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod mtime;
pub mod orchestrator;
pub mod recovery;
pub mod service;

pub use cancel::CancelToken;
pub use config::CalcConfig;
pub use context::CalcContext;
pub use error::{CalcError, RemoteError};
pub use mtime::{refresh_batch, refresh_modification_times};
pub use orchestrator::{
    BatchEvent, BatchOutcome, BatchState, Calculator, Progress, SlotFailure, SlotResult,
};
pub use service::{CalculationService, ModificationTimeSource, RemoteCall};
