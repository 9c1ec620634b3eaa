//! Scheduling facility boundary and an in-process implementation of it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::request::{DeviceState, ExistingPeriodicWorkPolicy, PeriodicWorkRequest};
use super::WorkOutcome;

/// Initial retry delay, doubled per consecutive retry
const DEFAULT_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound for the retry delay
const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60 * 60);

/// How often unmet constraints are re-checked
const CONSTRAINT_POLL: Duration = Duration::from_secs(60);

/// Lifecycle of one named job as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
  /// Waiting for its first run
  Enqueued,
  Running,
  Succeeded,
  /// Last run asked to be retried; next run uses backoff
  Retrying,
  /// Last run failed for good; next run waits the full interval
  Failed,
}

/// Snapshot of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkInfo {
  /// Changes only when the schedule is (re)created
  pub id: u64,
  pub state: WorkState,
  /// Consecutive retries since the last success or failure
  pub run_attempt_count: u32,
  pub next_run_at: DateTime<Utc>,
  pub interval: Duration,
}

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
  Enqueued,
  /// A job with this name already existed and was left untouched
  Kept,
  Replaced,
}

/// The host facility that owns timing, constraints and retries.
pub trait WorkHost: Send + Sync {
  /// Schedule `request` under `name`, deduplicated according to `policy`.
  fn enqueue_unique_periodic_work(
    &self,
    name: &str,
    policy: ExistingPeriodicWorkPolicy,
    request: PeriodicWorkRequest,
  ) -> EnqueueOutcome;

  /// Stop the job named `name`. Returns `false` if none was scheduled.
  fn cancel_unique_work(&self, name: &str) -> bool;

  fn work_info(&self, name: &str) -> Option<WorkInfo>;
}

/// Source of device conditions for constraint checks.
pub trait DeviceProbe: Send + Sync {
  fn current(&self) -> DeviceState;
}

/// Probe for machines that report nothing: always plugged in and online.
pub struct UnconstrainedDevice;

impl DeviceProbe for UnconstrainedDevice {
  fn current(&self) -> DeviceState {
    DeviceState::unconstrained()
  }
}

#[derive(Debug, Clone, Copy)]
struct Backoff {
  initial: Duration,
  max: Duration,
}

impl Backoff {
  fn delay(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    self.initial.saturating_mul(factor).min(self.max)
  }
}

struct Job {
  info: WorkInfo,
  handle: JoinHandle<()>,
}

type Jobs = Arc<Mutex<HashMap<String, Job>>>;

fn lock(jobs: &Mutex<HashMap<String, Job>>) -> MutexGuard<'_, HashMap<String, Job>> {
  jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tokio-based host for processes without a platform job scheduler.
///
/// Each named job runs on its own task, so runs of one job never overlap.
/// Must be used from within a tokio runtime.
pub struct InProcessWorkManager {
  jobs: Jobs,
  probe: Arc<dyn DeviceProbe>,
  backoff: Backoff,
  constraint_poll: Duration,
  next_id: AtomicU64,
}

impl InProcessWorkManager {
  pub fn new(probe: Arc<dyn DeviceProbe>) -> Self {
    Self {
      jobs: Arc::new(Mutex::new(HashMap::new())),
      probe,
      backoff: Backoff {
        initial: DEFAULT_BACKOFF,
        max: MAX_BACKOFF,
      },
      constraint_poll: CONSTRAINT_POLL,
      next_id: AtomicU64::new(1),
    }
  }

  /// Override the retry backoff.
  pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
    self.backoff = Backoff { initial, max };
    self
  }

  /// Override how often unmet constraints are re-checked.
  pub fn with_constraint_poll(mut self, poll: Duration) -> Self {
    self.constraint_poll = poll;
    self
  }

  /// Names of all scheduled jobs
  pub fn job_names(&self) -> Vec<String> {
    lock(&self.jobs).keys().cloned().collect()
  }
}

impl WorkHost for InProcessWorkManager {
  fn enqueue_unique_periodic_work(
    &self,
    name: &str,
    policy: ExistingPeriodicWorkPolicy,
    request: PeriodicWorkRequest,
  ) -> EnqueueOutcome {
    let mut jobs = lock(&self.jobs);

    let outcome = match (jobs.remove(name), policy) {
      (Some(existing), ExistingPeriodicWorkPolicy::Keep) => {
        debug!(work = name, "work already scheduled, keeping it");
        jobs.insert(name.to_string(), existing);
        return EnqueueOutcome::Kept;
      }
      (Some(existing), ExistingPeriodicWorkPolicy::Replace) => {
        existing.handle.abort();
        EnqueueOutcome::Replaced
      }
      (None, _) => EnqueueOutcome::Enqueued,
    };

    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let info = WorkInfo {
      id,
      state: WorkState::Enqueued,
      run_attempt_count: 0,
      next_run_at: Utc::now(),
      interval: request.interval,
    };
    let runner = JobRunner {
      name: name.to_string(),
      id,
      jobs: Arc::clone(&self.jobs),
      probe: Arc::clone(&self.probe),
      backoff: self.backoff,
      constraint_poll: self.constraint_poll,
    };
    let handle = tokio::spawn(runner.run(request));
    jobs.insert(name.to_string(), Job { info, handle });

    info!(work = name, ?outcome, "periodic work scheduled");
    outcome
  }

  fn cancel_unique_work(&self, name: &str) -> bool {
    match lock(&self.jobs).remove(name) {
      Some(job) => {
        job.handle.abort();
        info!(work = name, "periodic work cancelled");
        true
      }
      None => false,
    }
  }

  fn work_info(&self, name: &str) -> Option<WorkInfo> {
    lock(&self.jobs).get(name).map(|job| job.info.clone())
  }
}

impl Drop for InProcessWorkManager {
  fn drop(&mut self) {
    for job in lock(&self.jobs).values() {
      job.handle.abort();
    }
  }
}

/// Background loop driving one scheduled job.
struct JobRunner {
  name: String,
  id: u64,
  jobs: Jobs,
  probe: Arc<dyn DeviceProbe>,
  backoff: Backoff,
  constraint_poll: Duration,
}

impl JobRunner {
  async fn run(self, request: PeriodicWorkRequest) {
    let mut delay = Duration::ZERO;
    let mut attempt = 0u32;

    loop {
      tokio::time::sleep(delay).await;

      while !request.constraints.satisfied_by(&self.probe.current()) {
        debug!(work = %self.name, "constraints not met, waiting");
        tokio::time::sleep(self.constraint_poll).await;
      }

      self.update(|info| info.state = WorkState::Running);
      let outcome = request.worker.do_work().await;

      let state = match outcome {
        WorkOutcome::Success => {
          attempt = 0;
          delay = request.interval;
          WorkState::Succeeded
        }
        WorkOutcome::Retry => {
          attempt = attempt.saturating_add(1);
          delay = self.backoff.delay(attempt);
          warn!(work = %self.name, attempt, ?delay, "run will be retried");
          WorkState::Retrying
        }
        WorkOutcome::Failure => {
          attempt = 0;
          delay = request.interval;
          WorkState::Failed
        }
      };

      let next_run_at = after(delay);
      self.update(|info| {
        info.state = state;
        info.run_attempt_count = attempt;
        info.next_run_at = next_run_at;
      });
    }
  }

  /// Apply `f` to this job's info, unless it has been replaced or cancelled.
  fn update(&self, f: impl FnOnce(&mut WorkInfo)) {
    if let Some(job) = lock(&self.jobs).get_mut(&self.name) {
      if job.info.id == self.id {
        f(&mut job.info);
      }
    }
  }
}

fn after(delay: Duration) -> DateTime<Utc> {
  chrono::Duration::from_std(delay)
    .ok()
    .and_then(|d| Utc::now().checked_add_signed(d))
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
