use std::{process::Stdio, time::Duration};

use anyhow::Context;
use tokio::{
    process::Command,
    time::{sleep, Instant},
};

use crate::control_port::{ServiceControl, WaitTimeout};

const POLL_STEP: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty.
    pub fn message(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Run a command to completion, capturing its output. The child is killed
/// if the returned future is dropped.
pub(crate) async fn run_command<S: AsRef<str>>(cmd: &[S]) -> anyhow::Result<CommandOutput> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty command"))?;

    let output = Command::new(program.as_ref())
        .args(args.iter().map(|arg| -> &str { arg.as_ref() }))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("cannot run `{}`", program.as_ref()))?;

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Poll `control` until `unit` is (or is not) running, up to `timeout`.
pub(crate) async fn wait_for_state(
    control: &(impl ServiceControl + ?Sized),
    unit: &str,
    running: bool,
    timeout: Duration,
) -> anyhow::Result<()> {
    let start = Instant::now();
    loop {
        if control.is_running(unit).await? == running {
            return Ok(());
        }

        if start.elapsed() >= timeout {
            return Err(WaitTimeout {
                unit: unit.to_owned(),
                target: if running { "running" } else { "stopped" },
                waited: timeout,
            }
            .into());
        }
        sleep(POLL_STEP).await;
    }
}
