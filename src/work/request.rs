//! Declarative description of a periodic job and its run conditions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::Worker;

/// Kind of network a job needs before it may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkType {
  #[default]
  NotRequired,
  Connected,
  Unmetered,
}

/// Preconditions the host must observe before starting a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
  pub required_network: NetworkType,
  pub requires_battery_not_low: bool,
  pub requires_charging: bool,
  /// Best-effort: ignored where the platform cannot report idleness
  pub requires_device_idle: bool,
}

/// What the platform currently reports about the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
  /// `None` when offline
  pub network: Option<NetworkType>,
  pub battery_low: bool,
  pub charging: bool,
  /// `None` when the platform cannot tell
  pub idle: Option<bool>,
}

impl DeviceState {
  /// A plugged-in machine on an unmetered link with unknown idleness.
  pub fn unconstrained() -> Self {
    Self {
      network: Some(NetworkType::Unmetered),
      battery_low: false,
      charging: true,
      idle: None,
    }
  }
}

impl Constraints {
  /// Whether a run may start on a device in `state`.
  pub fn satisfied_by(&self, state: &DeviceState) -> bool {
    let network_ok = match (self.required_network, state.network) {
      (NetworkType::NotRequired, _) => true,
      (_, None) => false,
      (NetworkType::Connected, Some(_)) => true,
      (NetworkType::Unmetered, Some(kind)) => kind == NetworkType::Unmetered,
    };

    network_ok
      && !(self.requires_battery_not_low && state.battery_low)
      && !(self.requires_charging && !state.charging)
      && !(self.requires_device_idle && state.idle == Some(false))
  }
}

/// Dedup rule for a submission under a name that is already scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingPeriodicWorkPolicy {
  /// Leave the existing schedule alone and drop the new request
  Keep,
  /// Cancel the existing schedule and start the new request
  Replace,
}

/// A worker to run every `interval` once `constraints` hold.
#[derive(Clone)]
pub struct PeriodicWorkRequest {
  pub worker: Arc<dyn Worker>,
  pub interval: Duration,
  pub constraints: Constraints,
}

impl PeriodicWorkRequest {
  pub fn new(worker: Arc<dyn Worker>, interval: Duration) -> Self {
    Self {
      worker,
      interval,
      constraints: Constraints::default(),
    }
  }

  pub fn with_constraints(mut self, constraints: Constraints) -> Self {
    self.constraints = constraints;
    self
  }
}

impl fmt::Debug for PeriodicWorkRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PeriodicWorkRequest")
      .field("interval", &self.interval)
      .field("constraints", &self.constraints)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn strict() -> Constraints {
    Constraints {
      required_network: NetworkType::Unmetered,
      requires_battery_not_low: true,
      requires_charging: true,
      requires_device_idle: true,
    }
  }

  #[test]
  fn test_default_constraints_always_satisfied() {
    let offline = DeviceState {
      network: None,
      battery_low: true,
      charging: false,
      idle: Some(false),
    };
    assert!(Constraints::default().satisfied_by(&offline));
  }

  #[test]
  fn test_unknown_idleness_is_ignored() {
    assert!(strict().satisfied_by(&DeviceState::unconstrained()));
  }

  #[test]
  fn test_busy_device_blocks_idle_requirement() {
    let busy = DeviceState {
      idle: Some(false),
      ..DeviceState::unconstrained()
    };
    assert!(!strict().satisfied_by(&busy));
  }

  #[test]
  fn test_metered_network_blocks_unmetered_requirement() {
    let metered = DeviceState {
      network: Some(NetworkType::Connected),
      ..DeviceState::unconstrained()
    };
    assert!(!strict().satisfied_by(&metered));

    let any_network = Constraints {
      required_network: NetworkType::Connected,
      ..Constraints::default()
    };
    assert!(any_network.satisfied_by(&metered));
  }

  #[test]
  fn test_battery_and_charging() {
    let low = DeviceState {
      battery_low: true,
      ..DeviceState::unconstrained()
    };
    let unplugged = DeviceState {
      charging: false,
      ..DeviceState::unconstrained()
    };
    assert!(!strict().satisfied_by(&low));
    assert!(!strict().satisfied_by(&unplugged));
  }
}
