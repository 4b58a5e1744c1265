use std::{collections::HashMap, time::Duration};

use isotone_config::Config;
use isotone_types::{Operation, ServiceDescriptor};

use crate::control_port::{run_command, WaitTimeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallVerb {
    Install,
    Uninstall,
}

impl InstallVerb {
    /// The `is_installed` value a successful run leaves behind.
    #[must_use]
    pub fn expected_installed(self) -> bool {
        matches!(self, InstallVerb::Install)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InstallVerb::Install => "install",
            InstallVerb::Uninstall => "uninstall",
        }
    }
}

impl std::fmt::Display for InstallVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InstallVerb> for Operation {
    fn from(verb: InstallVerb) -> Self {
        match verb {
            InstallVerb::Install => Operation::Install,
            InstallVerb::Uninstall => Operation::Uninstall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ActionOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// External installer for services, usually a script.
///
/// The exit code is informational only: callers decide success by probing
/// the service manager afterwards.
#[async_trait::async_trait]
pub trait InstallAction: Send + Sync {
    async fn run(
        &self,
        descriptor: &ServiceDescriptor,
        verb: InstallVerb,
        timeout: Duration,
    ) -> anyhow::Result<ActionOutput>;
}

#[derive(Debug, Clone, Default)]
struct Commands {
    install: Option<Vec<String>>,
    uninstall: Option<Vec<String>>,
}

/// Runs the per-service install/uninstall commands from the configuration.
#[derive(Debug, Clone, Default)]
pub struct CommandInstallAction {
    commands: HashMap<String, Commands>,
}

impl CommandInstallAction {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let commands = config
            .services
            .iter()
            .map(|service| {
                (
                    service.descriptor.name.clone(),
                    Commands {
                        install: service.install.clone(),
                        uninstall: service.uninstall.clone(),
                    },
                )
            })
            .collect();
        Self { commands }
    }

    fn command(&self, descriptor: &ServiceDescriptor, verb: InstallVerb) -> Option<Vec<String>> {
        let commands = self.commands.get(&descriptor.name)?;
        let template = match verb {
            InstallVerb::Install => commands.install.as_ref(),
            InstallVerb::Uninstall => commands.uninstall.as_ref(),
        }?;
        Some(
            template
                .iter()
                .map(|arg| {
                    arg.replace("{service}", &descriptor.name)
                        .replace("{unit}", &descriptor.unit)
                })
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl InstallAction for CommandInstallAction {
    async fn run(
        &self,
        descriptor: &ServiceDescriptor,
        verb: InstallVerb,
        timeout: Duration,
    ) -> anyhow::Result<ActionOutput> {
        let cmd = self.command(descriptor, verb).ok_or_else(|| {
            anyhow::anyhow!("no {verb} command configured for `{}`", descriptor.name)
        })?;
        tracing::debug!(service = %descriptor.name, ?cmd, "running {verb} action");

        let Ok(result) = tokio::time::timeout(timeout, run_command(&cmd)).await else {
            return Err(WaitTimeout {
                unit: descriptor.unit.clone(),
                target: match verb {
                    InstallVerb::Install => "installed",
                    InstallVerb::Uninstall => "uninstalled",
                },
                waited: timeout,
            }
            .into());
        };
        let output = result?;

        let mut combined = output.stdout.trim().to_owned();
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr);
        }

        Ok(ActionOutput {
            exit_code: output.code,
            output: combined,
        })
    }
}
