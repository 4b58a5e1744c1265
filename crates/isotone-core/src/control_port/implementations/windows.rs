use std::time::Duration;

use crate::control_port::{
    implementations::{run_command, wait_for_state, CommandOutput},
    ServiceControl,
};

const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

/// Service control through the Windows `sc` tool.
#[derive(Debug, Clone, Default)]
pub struct WindowsServiceControl;

impl WindowsServiceControl {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn parse_state(output: &CommandOutput) -> Option<&'static str> {
    output.stdout.lines().find_map(|line| {
        let line = line.trim();
        if !line.starts_with("STATE") {
            return None;
        }
        ["RUNNING", "STOPPED", "START_PENDING", "STOP_PENDING", "PAUSED"]
            .into_iter()
            .find(|state| line.contains(state))
    })
}

#[async_trait::async_trait]
impl ServiceControl for WindowsServiceControl {
    async fn is_installed(&self, unit: &str) -> anyhow::Result<bool> {
        let output = run_command(&["sc", "query", unit]).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(ERROR_SERVICE_DOES_NOT_EXIST) => Ok(false),
            _ => anyhow::bail!("sc query {unit}: {}", output.message()),
        }
    }

    async fn is_running(&self, unit: &str) -> anyhow::Result<bool> {
        let output = run_command(&["sc", "query", unit]).await?;
        anyhow::ensure!(output.success(), "sc query {unit}: {}", output.message());
        Ok(parse_state(&output) == Some("RUNNING"))
    }

    async fn start(&self, unit: &str, timeout: Duration) -> anyhow::Result<()> {
        let output = run_command(&["sc", "start", unit]).await?;
        match output.code {
            Some(0 | ERROR_SERVICE_ALREADY_RUNNING) => {}
            _ => anyhow::bail!("sc start {unit}: {}", output.message()),
        }
        wait_for_state(self, unit, true, timeout).await
    }

    async fn stop(&self, unit: &str, timeout: Duration) -> anyhow::Result<()> {
        let output = run_command(&["sc", "stop", unit]).await?;
        match output.code {
            Some(0 | ERROR_SERVICE_NOT_ACTIVE) => {}
            _ => anyhow::bail!("sc stop {unit}: {}", output.message()),
        }
        wait_for_state(self, unit, false, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            stdout: stdout.to_owned(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_parse_running() {
        let stdout = "\nSERVICE_NAME: IsotoneApache\n        TYPE               : 10  WIN32_OWN_PROCESS\n        STATE              : 4  RUNNING\n";
        assert_eq!(parse_state(&output(stdout)), Some("RUNNING"));
    }

    #[test]
    fn test_parse_stopped() {
        let stdout = "SERVICE_NAME: IsotoneMariaDB\n        STATE              : 1  STOPPED\n";
        assert_eq!(parse_state(&output(stdout)), Some("STOPPED"));
    }

    #[test]
    fn test_parse_missing_state() {
        assert_eq!(parse_state(&output("garbage")), None);
    }
}
