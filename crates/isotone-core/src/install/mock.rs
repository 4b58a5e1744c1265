use std::{sync::Arc, time::Duration};

use isotone_types::ServiceDescriptor;
use parking_lot::Mutex;

use crate::{
    control_port::{MockServiceControl, WaitTimeout},
    install::{ActionOutput, InstallAction, InstallVerb},
};

#[derive(Debug, Clone)]
struct Script {
    exit_code: Option<i32>,
    effective: bool,
    delay: Duration,
    error: Option<String>,
    calls: usize,
}

/// Install action that flips the `installed` flag of a [`MockServiceControl`].
///
/// By default it exits 0 and takes effect; both can be changed to model
/// broken installer scripts.
#[derive(Debug)]
pub struct MockInstallAction {
    control: Arc<MockServiceControl>,
    script: Mutex<Script>,
}

impl MockInstallAction {
    #[must_use]
    pub fn new(control: Arc<MockServiceControl>) -> Self {
        Self {
            control,
            script: Mutex::new(Script {
                exit_code: Some(0),
                effective: true,
                delay: Duration::ZERO,
                error: None,
                calls: 0,
            }),
        }
    }

    /// Whether a run actually changes the installed flag.
    pub fn set_effective(&self, effective: bool) {
        self.script.lock().effective = effective;
    }

    pub fn set_exit_code(&self, exit_code: Option<i32>) {
        self.script.lock().exit_code = exit_code;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = delay;
    }

    /// Make the action fail to launch.
    pub fn fail(&self, message: &str) {
        self.script.lock().error = Some(message.to_owned());
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.script.lock().calls
    }
}

#[async_trait::async_trait]
impl InstallAction for MockInstallAction {
    async fn run(
        &self,
        descriptor: &ServiceDescriptor,
        verb: InstallVerb,
        timeout: Duration,
    ) -> anyhow::Result<ActionOutput> {
        let script = {
            let mut script = self.script.lock();
            script.calls += 1;
            script.clone()
        };

        if let Some(message) = script.error {
            anyhow::bail!("{message}");
        }

        if script.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(WaitTimeout {
                unit: descriptor.unit.clone(),
                target: verb.as_str(),
                waited: timeout,
            }
            .into());
        }
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        if script.effective {
            self.control
                .set_installed(&descriptor.unit, verb.expected_installed());
        }

        Ok(ActionOutput {
            exit_code: script.exit_code,
            output: format!("{verb} {}", descriptor.unit),
        })
    }
}
