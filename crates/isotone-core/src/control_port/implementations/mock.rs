use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use tokio::time::sleep;

use crate::control_port::{ServiceControl, WaitTimeout};

#[derive(Debug, Clone, Default)]
struct MockUnit {
    installed: bool,
    running: bool,

    probe_error: Option<String>,
    start_error: Option<String>,
    stop_error: Option<String>,

    probe_delay: Duration,
    start_delay: Duration,
    stop_delay: Duration,
    hang_start: bool,
    hang_stop: bool,

    probe_calls: usize,
    start_calls: usize,
    stop_calls: usize,
}

/// In-memory service manager. Backs the `simulated` backend and tests;
/// failures, delays and hangs can be injected per unit.
#[derive(Debug, Default)]
pub struct MockServiceControl {
    units: Mutex<HashMap<String, MockUnit>>,
}

impl MockServiceControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_unit(self, unit: &str, installed: bool, running: bool) -> Self {
        self.units.lock().insert(
            unit.to_owned(),
            MockUnit {
                installed,
                running: installed && running,
                ..MockUnit::default()
            },
        );
        self
    }

    fn with<R>(&self, unit: &str, f: impl FnOnce(&mut MockUnit) -> R) -> R {
        let mut units = self.units.lock();
        f(units.entry(unit.to_owned()).or_default())
    }

    pub fn set_installed(&self, unit: &str, installed: bool) {
        self.with(unit, |u| {
            u.installed = installed;
            if !installed {
                u.running = false;
            }
        });
    }

    pub fn set_running(&self, unit: &str, running: bool) {
        self.with(unit, |u| u.running = running);
    }

    pub fn fail_probe(&self, unit: &str, message: &str) {
        self.with(unit, |u| u.probe_error = Some(message.to_owned()));
    }

    pub fn fail_start(&self, unit: &str, message: &str) {
        self.with(unit, |u| u.start_error = Some(message.to_owned()));
    }

    pub fn fail_stop(&self, unit: &str, message: &str) {
        self.with(unit, |u| u.stop_error = Some(message.to_owned()));
    }

    pub fn clear_failures(&self, unit: &str) {
        self.with(unit, |u| {
            u.probe_error = None;
            u.start_error = None;
            u.stop_error = None;
            u.hang_start = false;
            u.hang_stop = false;
        });
    }

    pub fn delay_probe(&self, unit: &str, delay: Duration) {
        self.with(unit, |u| u.probe_delay = delay);
    }

    pub fn delay_start(&self, unit: &str, delay: Duration) {
        self.with(unit, |u| u.start_delay = delay);
    }

    pub fn delay_stop(&self, unit: &str, delay: Duration) {
        self.with(unit, |u| u.stop_delay = delay);
    }

    /// Make `start` never return.
    pub fn hang_start(&self, unit: &str) {
        self.with(unit, |u| u.hang_start = true);
    }

    /// Make `stop` never return.
    pub fn hang_stop(&self, unit: &str) {
        self.with(unit, |u| u.hang_stop = true);
    }

    #[must_use]
    pub fn installed(&self, unit: &str) -> bool {
        self.with(unit, |u| u.installed)
    }

    #[must_use]
    pub fn running(&self, unit: &str) -> bool {
        self.with(unit, |u| u.running)
    }

    #[must_use]
    pub fn probe_calls(&self, unit: &str) -> usize {
        self.with(unit, |u| u.probe_calls)
    }

    #[must_use]
    pub fn start_calls(&self, unit: &str) -> usize {
        self.with(unit, |u| u.start_calls)
    }

    #[must_use]
    pub fn stop_calls(&self, unit: &str) -> usize {
        self.with(unit, |u| u.stop_calls)
    }

    async fn transition(
        &self,
        unit: &str,
        running: bool,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let (delay, hang, error) = self.with(unit, |u| {
            if running {
                u.start_calls += 1;
                (u.start_delay, u.hang_start, u.start_error.clone())
            } else {
                u.stop_calls += 1;
                (u.stop_delay, u.hang_stop, u.stop_error.clone())
            }
        });

        if hang {
            std::future::pending::<()>().await;
        }

        if delay > timeout {
            sleep(timeout).await;
            return Err(WaitTimeout {
                unit: unit.to_owned(),
                target: if running { "running" } else { "stopped" },
                waited: timeout,
            }
            .into());
        }
        if !delay.is_zero() {
            sleep(delay).await;
        }

        if let Some(message) = error {
            anyhow::bail!("{message}");
        }

        self.with(unit, |u| {
            anyhow::ensure!(u.installed, "service `{unit}` does not exist");
            u.running = running;
            Ok(())
        })
    }
}

#[async_trait::async_trait]
impl ServiceControl for MockServiceControl {
    async fn is_installed(&self, unit: &str) -> anyhow::Result<bool> {
        let (delay, error) = self.with(unit, |u| {
            u.probe_calls += 1;
            (u.probe_delay, u.probe_error.clone())
        });
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if let Some(message) = error {
            anyhow::bail!("{message}");
        }
        Ok(self.installed(unit))
    }

    async fn is_running(&self, unit: &str) -> anyhow::Result<bool> {
        if let Some(message) = self.with(unit, |u| u.probe_error.clone()) {
            anyhow::bail!("{message}");
        }
        Ok(self.running(unit))
    }

    async fn start(&self, unit: &str, timeout: Duration) -> anyhow::Result<()> {
        self.transition(unit, true, timeout).await
    }

    async fn stop(&self, unit: &str, timeout: Duration) -> anyhow::Result<()> {
        self.transition(unit, false, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_stop() {
        let control = MockServiceControl::new().with_unit("web", true, false);

        control.start("web", Duration::from_secs(1)).await.unwrap();
        assert!(control.is_running("web").await.unwrap());

        control.stop("web", Duration::from_secs(1)).await.unwrap();
        assert!(!control.is_running("web").await.unwrap());

        assert_eq!(control.start_calls("web"), 1);
        assert_eq!(control.stop_calls("web"), 1);
    }

    #[tokio::test]
    async fn test_start_unknown_unit_fails() {
        let control = MockServiceControl::new();
        assert!(!control.is_installed("ghost").await.unwrap());
        assert!(control.start("ghost", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_start_times_out() {
        let control = MockServiceControl::new().with_unit("db", true, false);
        control.delay_start("db", Duration::from_secs(10));

        let err = control
            .start("db", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<WaitTimeout>().is_some());
        assert!(!control.running("db"));
    }

    #[tokio::test]
    async fn test_probe_failure() {
        let control = MockServiceControl::new().with_unit("mail", true, true);
        control.fail_probe("mail", "rpc unavailable");
        assert!(control.is_installed("mail").await.is_err());
        assert!(control.is_running("mail").await.is_err());

        control.clear_failures("mail");
        assert!(control.is_running("mail").await.unwrap());
    }
}
