use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::host::{EnqueueOutcome, WorkHost};
use super::request::{Constraints, ExistingPeriodicWorkPolicy, NetworkType, PeriodicWorkRequest};
use super::{WorkOutcome, Worker};
use crate::repository::VideosRepository;

/// Time between scheduled refreshes
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Refreshes the video cache when the host triggers it.
pub struct RefreshDataWorker {
  repository: VideosRepository,
}

impl RefreshDataWorker {
  /// Unique work name; resubmitting under it never duplicates the schedule.
  pub const WORK_NAME: &'static str = "RefreshDataWorker";

  pub fn new(repository: VideosRepository) -> Self {
    Self { repository }
  }
}

#[async_trait]
impl Worker for RefreshDataWorker {
  async fn do_work(&self) -> WorkOutcome {
    match self.repository.refresh().await {
      Ok(()) => WorkOutcome::Success,
      Err(e) => {
        warn!(error = %e, "video refresh failed, asking host to retry");
        WorkOutcome::Retry
      }
    }
  }
}

/// Run only on an unmetered network, with a healthy battery, while charging
/// and, where the platform can tell, while the device is idle.
pub fn refresh_constraints() -> Constraints {
  Constraints {
    required_network: NetworkType::Unmetered,
    requires_battery_not_low: true,
    requires_charging: true,
    requires_device_idle: true,
  }
}

/// Submit the daily refresh. Safe to call on every start.
pub fn setup_recurring_work(host: &dyn WorkHost, repository: VideosRepository) -> EnqueueOutcome {
  let request = PeriodicWorkRequest::new(
    Arc::new(RefreshDataWorker::new(repository)),
    REFRESH_INTERVAL,
  )
  .with_constraints(refresh_constraints());

  let outcome = host.enqueue_unique_periodic_work(
    RefreshDataWorker::WORK_NAME,
    ExistingPeriodicWorkPolicy::Keep,
    request,
  );
  info!(?outcome, "recurring refresh set up");
  outcome
}
