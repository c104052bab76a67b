//! Deployment-plan execution engine.
//!
//! This module runs a parsed plan against a [`HypervisorProvider`]:
//! - Provisioning VMs from templates ([`Provisioner`])
//! - Dispatching execute and download commands ([`CommandDispatcher`])
//! - Watching remote processes to completion ([`ProcessWatcher`])
//! - Driving deployments in order and finalizing templates ([`DeploymentDriver`])
//!
//! Execution is strictly sequential. Every error is fatal to the run and is
//! returned to the caller; nothing below `main` terminates the process.
//!
//! [`HypervisorProvider`]: crate::provider::HypervisorProvider

mod context;
mod dispatcher;
mod driver;
mod provisioner;
mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;

pub use context::{CommandCursor, ExecutionContext, ResultStore};
pub use dispatcher::CommandDispatcher;
pub use driver::{DeploymentDriver, DeploymentReport, RunReport};
pub use provisioner::Provisioner;
pub use watcher::{ProcessWatcher, WatchState};

/// Default interval between process polls in seconds.
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 5;

/// Default number of consecutive polls without a record before a process is lost.
pub const DEFAULT_MISS_LIMIT: u32 = 12;

/// Default interval between power state polls in seconds.
pub const DEFAULT_POWER_OFF_INTERVAL_SECS: u64 = 2;

/// Default number of power state polls after a shutdown request.
pub const DEFAULT_POWER_OFF_ITERATIONS: u32 = 60;

/// Default time to wait for a guest IP address in seconds.
pub const DEFAULT_GUEST_IP_TIMEOUT_SECS: u64 = 600;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Interval between process polls.
    pub watch_interval: Duration,
    /// Consecutive polls without a record before a process is lost.
    pub miss_limit: u32,
    /// Wall-clock bound on a single watched process. Unbounded when `None`.
    pub watch_deadline: Option<Duration>,
    /// Interval between power state polls.
    pub power_off_interval: Duration,
    /// Power state polls before giving up on a shutdown.
    pub power_off_iterations: u32,
    /// Time to wait for the guest to report an IP address.
    pub guest_ip_timeout: Duration,
    /// Fail finalization when the VM never reports powered off.
    pub strict_power_off: bool,
    /// Fail an execute whose result key holds nothing.
    pub strict_results: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            watch_interval: Duration::from_secs(DEFAULT_WATCH_INTERVAL_SECS),
            miss_limit: DEFAULT_MISS_LIMIT,
            watch_deadline: None,
            power_off_interval: Duration::from_secs(DEFAULT_POWER_OFF_INTERVAL_SECS),
            power_off_iterations: DEFAULT_POWER_OFF_ITERATIONS,
            guest_ip_timeout: Duration::from_secs(DEFAULT_GUEST_IP_TIMEOUT_SECS),
            strict_power_off: false,
            strict_results: false,
        }
    }
}
