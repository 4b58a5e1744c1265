use std::time::Duration;

use crate::control_port::{
    implementations::{run_command, wait_for_state},
    ServiceControl,
};

/// Service control through `systemctl`.
#[derive(Debug, Clone, Default)]
pub struct SystemdControl {
    user: bool,
}

impl SystemdControl {
    #[must_use]
    pub fn new() -> Self {
        Self { user: false }
    }

    /// Talk to the per-user service manager instead of the system one.
    #[must_use]
    pub fn user() -> Self {
        Self { user: true }
    }

    fn systemctl<'a>(&self, args: &[&'a str]) -> Vec<&'a str> {
        let mut cmd = Vec::with_capacity(args.len() + 2);
        cmd.push("systemctl");
        if self.user {
            cmd.push("--user");
        }
        cmd.extend_from_slice(args);
        cmd
    }
}

fn parse_load_state(output: &str) -> bool {
    !matches!(output.trim(), "not-found" | "")
}

fn parse_active_state(output: &str) -> bool {
    matches!(output.trim(), "active" | "reloading")
}

#[async_trait::async_trait]
impl ServiceControl for SystemdControl {
    async fn is_installed(&self, unit: &str) -> anyhow::Result<bool> {
        let output =
            run_command(&self.systemctl(&["show", "--property=LoadState", "--value", unit]))
                .await?;
        anyhow::ensure!(
            output.success(),
            "systemctl show {unit}: {}",
            output.message()
        );
        Ok(parse_load_state(&output.stdout))
    }

    async fn is_running(&self, unit: &str) -> anyhow::Result<bool> {
        // is-active exits non-zero for inactive units; only the state matters
        let output = run_command(&self.systemctl(&["is-active", unit])).await?;
        Ok(parse_active_state(&output.stdout))
    }

    async fn start(&self, unit: &str, timeout: Duration) -> anyhow::Result<()> {
        let output = run_command(&self.systemctl(&["start", "--no-block", unit])).await?;
        anyhow::ensure!(
            output.success(),
            "systemctl start {unit}: {}",
            output.message()
        );
        wait_for_state(self, unit, true, timeout).await
    }

    async fn stop(&self, unit: &str, timeout: Duration) -> anyhow::Result<()> {
        let output = run_command(&self.systemctl(&["stop", "--no-block", unit])).await?;
        anyhow::ensure!(
            output.success(),
            "systemctl stop {unit}: {}",
            output.message()
        );
        wait_for_state(self, unit, false, timeout).await
    }
}
