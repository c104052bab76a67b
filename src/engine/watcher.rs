//! Remote process watcher.
//!
//! Polls the guest agent for a single PID until the process finishes, the
//! guest stops reporting it, or an optional deadline passes.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, WatchError};
use crate::provider::{GuestCredentials, HypervisorProvider, ProcessRecord, VmRef};

use super::EngineSettings;

/// Observed state of a watched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Still running, or temporarily invisible.
    Running,
    /// Finished with exit code zero.
    CompletedSuccess,
    /// Finished with a non-zero exit code.
    CompletedFailure(i32),
    /// Missing from too many consecutive polls.
    LostVisibility,
}

impl WatchState {
    /// Returns true once the watch should stop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Watches one remote process at a time.
pub struct ProcessWatcher<'a> {
    provider: &'a dyn HypervisorProvider,
    interval: Duration,
    miss_limit: u32,
    deadline: Option<Duration>,
}

impl<'a> ProcessWatcher<'a> {
    /// Creates a watcher using the engine's poll settings.
    #[must_use]
    pub fn new(provider: &'a dyn HypervisorProvider, settings: &EngineSettings) -> Self {
        Self {
            provider,
            interval: settings.watch_interval,
            miss_limit: settings.miss_limit,
            deadline: settings.watch_deadline,
        }
    }

    /// Applies one poll result to the state machine.
    ///
    /// `misses` counts consecutive polls without a record. It is reset as
    /// soon as a record is observed again.
    #[must_use]
    pub fn transition(record: Option<&ProcessRecord>, misses: &mut u32, miss_limit: u32) -> WatchState {
        let Some(record) = record else {
            *misses += 1;
            return if *misses >= miss_limit {
                WatchState::LostVisibility
            } else {
                WatchState::Running
            };
        };

        *misses = 0;
        match (record.end_time, record.exit_code) {
            (None, _) => WatchState::Running,
            (Some(_), 0) => WatchState::CompletedSuccess,
            (Some(_), code) => WatchState::CompletedFailure(code),
        }
    }

    /// Polls `pid` until it finishes.
    ///
    /// The first poll happens immediately; later polls are spaced by the
    /// watch interval.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::NonZeroExit` on a failed exit, `WatchError::Lost`
    /// once the process has been missing for `miss_limit` consecutive polls,
    /// `WatchError::DeadlineExceeded` past the deadline, or any provider error
    /// raised while polling.
    pub async fn watch(&self, vm: &VmRef, credentials: &GuestCredentials, pid: i64) -> Result<()> {
        let started = Instant::now();
        let mut misses = 0;

        loop {
            let records = self
                .provider
                .list_guest_processes(vm, credentials, &[pid])
                .await?;
            let record = records.iter().find(|r| r.pid == pid);

            match Self::transition(record, &mut misses, self.miss_limit) {
                WatchState::CompletedSuccess => {
                    debug!("Process {pid} completed");
                    return Ok(());
                }
                WatchState::CompletedFailure(code) => {
                    return Err(WatchError::NonZeroExit { pid, code }.into());
                }
                WatchState::LostVisibility => {
                    warn!("Process {pid} not reported for {misses} consecutive polls");
                    return Err(WatchError::Lost { pid, misses }.into());
                }
                WatchState::Running if misses > 0 => {
                    debug!("Process {pid} not reported ({misses}/{})", self.miss_limit);
                }
                WatchState::Running => debug!("Process {pid} still running"),
            }

            if let Some(deadline) = self.deadline {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    return Err(WatchError::DeadlineExceeded {
                        pid,
                        elapsed_secs: elapsed.as_secs(),
                    }
                    .into());
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;
    use crate::provider::MockHypervisorProvider;
    use chrono::Utc;
    use mockall::Sequence;
    use tokio_test::{assert_err, assert_ok};

    fn settings() -> EngineSettings {
        EngineSettings {
            watch_interval: Duration::ZERO,
            ..EngineSettings::default()
        }
    }

    fn vm() -> VmRef {
        VmRef(String::from("vm-42"))
    }

    fn creds() -> GuestCredentials {
        GuestCredentials::new("root", "changeme")
    }

    fn running(pid: i64) -> ProcessRecord {
        ProcessRecord {
            pid,
            command_line: String::from("/usr/bin/sudo -n -u root /bin/sleep 5"),
            end_time: None,
            exit_code: 0,
        }
    }

    fn finished(pid: i64, exit_code: i32) -> ProcessRecord {
        ProcessRecord {
            end_time: Some(Utc::now()),
            exit_code,
            ..running(pid)
        }
    }

    fn watch_error(err: ForgeError) -> WatchError {
        match err {
            ForgeError::Watch(e) => e,
            other => panic!("expected a watch error, got {other}"),
        }
    }

    #[test]
    fn test_transition_success_requires_end_time_and_zero_exit() {
        let mut misses = 0;
        assert_eq!(
            ProcessWatcher::transition(Some(&running(1)), &mut misses, 12),
            WatchState::Running
        );
        assert_eq!(
            ProcessWatcher::transition(Some(&finished(1, 0)), &mut misses, 12),
            WatchState::CompletedSuccess
        );
        assert_eq!(
            ProcessWatcher::transition(Some(&finished(1, 2)), &mut misses, 12),
            WatchState::CompletedFailure(2)
        );
        assert_eq!(
            ProcessWatcher::transition(Some(&finished(1, -1)), &mut misses, 12),
            WatchState::CompletedFailure(-1)
        );
    }

    #[test]
    fn test_transition_observation_resets_misses() {
        let mut misses = 0;
        for _ in 0..11 {
            assert_eq!(ProcessWatcher::transition(None, &mut misses, 12), WatchState::Running);
        }
        assert_eq!(misses, 11);

        assert_eq!(
            ProcessWatcher::transition(Some(&running(1)), &mut misses, 12),
            WatchState::Running
        );
        assert_eq!(misses, 0);

        for _ in 0..11 {
            assert_eq!(ProcessWatcher::transition(None, &mut misses, 12), WatchState::Running);
        }
        assert_eq!(
            ProcessWatcher::transition(None, &mut misses, 12),
            WatchState::LostVisibility
        );
        assert!(WatchState::LostVisibility.is_terminal());
    }

    #[tokio::test]
    async fn test_watch_succeeds_after_running_polls() {
        let mut provider = MockHypervisorProvider::new();
        let mut seq = Sequence::new();
        provider
            .expect_list_guest_processes()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![running(7)]));
        provider
            .expect_list_guest_processes()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![finished(7, 0)]));

        let watcher = ProcessWatcher::new(&provider, &settings());
        assert_ok!(watcher.watch(&vm(), &creds(), 7).await);
    }

    #[tokio::test]
    async fn test_watch_reports_exit_code() {
        let mut provider = MockHypervisorProvider::new();
        provider
            .expect_list_guest_processes()
            .times(1)
            .returning(|_, _, _| Ok(vec![finished(7, 127)]));

        let watcher = ProcessWatcher::new(&provider, &settings());
        let err = watch_error(watcher.watch(&vm(), &creds(), 7).await.unwrap_err());
        assert_eq!(err, WatchError::NonZeroExit { pid: 7, code: 127 });
    }

    #[tokio::test]
    async fn test_watch_lost_after_exactly_miss_limit_polls() {
        let mut provider = MockHypervisorProvider::new();
        provider
            .expect_list_guest_processes()
            .times(12)
            .returning(|_, _, _| Ok(Vec::new()));

        let watcher = ProcessWatcher::new(&provider, &settings());
        let err = watch_error(watcher.watch(&vm(), &creds(), 7).await.unwrap_err());
        assert_eq!(err, WatchError::Lost { pid: 7, misses: 12 });
    }

    #[tokio::test]
    async fn test_watch_ignores_records_of_other_pids() {
        let mut provider = MockHypervisorProvider::new();
        provider
            .expect_list_guest_processes()
            .times(3)
            .returning(|_, _, _| Ok(vec![finished(8, 0)]));

        let watcher = ProcessWatcher::new(
            &provider,
            &EngineSettings {
                miss_limit: 3,
                ..settings()
            },
        );
        let err = watch_error(watcher.watch(&vm(), &creds(), 7).await.unwrap_err());
        assert_eq!(err, WatchError::Lost { pid: 7, misses: 3 });
    }

    #[tokio::test]
    async fn test_watch_recovers_from_intermittent_misses() {
        let mut provider = MockHypervisorProvider::new();
        let mut seq = Sequence::new();
        provider
            .expect_list_guest_processes()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Vec::new()));
        provider
            .expect_list_guest_processes()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![running(7)]));
        provider
            .expect_list_guest_processes()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Vec::new()));
        provider
            .expect_list_guest_processes()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![finished(7, 0)]));

        let watcher = ProcessWatcher::new(
            &provider,
            &EngineSettings {
                miss_limit: 3,
                ..settings()
            },
        );
        assert_ok!(watcher.watch(&vm(), &creds(), 7).await);
    }

    #[tokio::test]
    async fn test_watch_deadline() {
        let mut provider = MockHypervisorProvider::new();
        provider
            .expect_list_guest_processes()
            .returning(|_, _, _| Ok(vec![running(7)]));

        let watcher = ProcessWatcher::new(
            &provider,
            &EngineSettings {
                watch_interval: Duration::from_millis(5),
                watch_deadline: Some(Duration::from_millis(20)),
                ..settings()
            },
        );
        let err = watch_error(watcher.watch(&vm(), &creds(), 7).await.unwrap_err());
        assert!(matches!(err, WatchError::DeadlineExceeded { pid: 7, .. }));
    }

    #[tokio::test]
    async fn test_watch_propagates_provider_errors() {
        let mut provider = MockHypervisorProvider::new();
        provider
            .expect_list_guest_processes()
            .times(1)
            .returning(|_, _, _| Err(crate::error::ProviderError::network("reset").into()));

        let watcher = ProcessWatcher::new(&provider, &settings());
        assert_err!(watcher.watch(&vm(), &creds(), 7).await);
    }
}
