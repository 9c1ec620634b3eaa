//! Background refresh scheduling.
//!
//! The host facility (platform scheduler or [`InProcessWorkManager`]) owns
//! timing, constraint checks and retry backoff. This module only describes
//! the job and adapts its outcome.

mod host;
mod refresh;
mod request;

use async_trait::async_trait;

pub use host::{
  DeviceProbe, EnqueueOutcome, InProcessWorkManager, UnconstrainedDevice, WorkHost, WorkInfo,
  WorkState,
};
pub use refresh::{refresh_constraints, setup_recurring_work, RefreshDataWorker, REFRESH_INTERVAL};
pub use request::{
  Constraints, DeviceState, ExistingPeriodicWorkPolicy, NetworkType, PeriodicWorkRequest,
};

/// Result a worker reports back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
  Success,
  /// Transient failure; the host reschedules with backoff
  Retry,
  /// Permanent failure for this run
  Failure,
}

/// Unit of work invoked by the host at trigger time.
#[async_trait]
pub trait Worker: Send + Sync {
  async fn do_work(&self) -> WorkOutcome;
}
