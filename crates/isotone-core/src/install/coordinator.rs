use std::{collections::HashMap, sync::Arc, time::Duration};

use isotone_types::ServiceDescriptor;
use parking_lot::Mutex;

use crate::{
    control_port::ServiceControl,
    deadline::{with_deadline, GRACE},
    install::{InstallAction, InstallVerb},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    NotRequested,
    Running(InstallVerb),
    Completed(InstallVerb),
    Failed { verb: InstallVerb, reason: String },
}

/// A failed install or uninstall, with the installed flag observed after the
/// action ran. `installed` is `None` when the service manager could not be
/// queried.
#[derive(Debug)]
pub struct InstallFailure {
    pub error: Error,
    pub installed: Option<bool>,
}

/// Runs install actions and decides their outcome from a fresh probe of the
/// service manager, never from the action's exit code alone.
///
/// Callers must hold the service's in-flight guard while [`run`] executes.
///
/// [`run`]: InstallCoordinator::run
pub struct InstallCoordinator {
    control: Arc<dyn ServiceControl>,
    action: Arc<dyn InstallAction>,
    probe_timeout: Duration,
    install_timeout: Duration,
    status: Mutex<HashMap<String, InstallStatus>>,
}

impl InstallCoordinator {
    pub fn new(
        control: Arc<dyn ServiceControl>,
        action: Arc<dyn InstallAction>,
        probe_timeout: Duration,
        install_timeout: Duration,
    ) -> Self {
        Self {
            control,
            action,
            probe_timeout,
            install_timeout,
            status: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn status(&self, service: &str) -> InstallStatus {
        self.status
            .lock()
            .get(service)
            .cloned()
            .unwrap_or(InstallStatus::NotRequested)
    }

    fn set_status(&self, service: &str, status: InstallStatus) {
        self.status.lock().insert(service.to_owned(), status);
    }

    async fn probe_installed(&self, descriptor: &ServiceDescriptor) -> Result<bool> {
        with_deadline(
            &descriptor.name,
            "probe",
            self.probe_timeout,
            self.control.is_installed(&descriptor.unit),
        )
        .await
    }

    /// Run `verb` for `descriptor`. Succeeds only if the installed flag moved
    /// from `!expected` to `expected`.
    ///
    /// # Errors
    ///
    /// A probe failure, a failed or timed out action, or an action without
    /// effect, together with the installed flag seen afterwards.
    pub async fn run(
        &self,
        descriptor: &ServiceDescriptor,
        verb: InstallVerb,
    ) -> Result<(), InstallFailure> {
        let name = descriptor.name.as_str();
        self.set_status(name, InstallStatus::Running(verb));

        let result = self.execute(descriptor, verb).await;
        match &result {
            Ok(()) => {
                tracing::info!(service = name, "{verb} completed");
                self.set_status(name, InstallStatus::Completed(verb));
            }
            Err(failure) => {
                tracing::warn!(service = name, "{verb} failed: {}", failure.error);
                self.set_status(
                    name,
                    InstallStatus::Failed {
                        verb,
                        reason: failure.error.to_string(),
                    },
                );
            }
        }
        result
    }

    async fn execute(
        &self,
        descriptor: &ServiceDescriptor,
        verb: InstallVerb,
    ) -> Result<(), InstallFailure> {
        let name = descriptor.name.as_str();
        let expected = verb.expected_installed();
        let unobserved = |error| InstallFailure {
            error,
            installed: None,
        };

        let before = self.probe_installed(descriptor).await.map_err(unobserved)?;

        let launched = tokio::time::timeout(
            self.install_timeout + GRACE,
            self.action.run(descriptor, verb, self.install_timeout),
        )
        .await;
        let action_error = match launched {
            Ok(Ok(output)) if output.success() => None,
            Ok(Ok(output)) => Some(Error::ActionFailed {
                service: name.to_owned(),
                operation: verb.into(),
                message: match output.exit_code {
                    Some(code) => format!("exit code {code}: {}", output.output),
                    None => format!("terminated by signal: {}", output.output),
                },
            }),
            Ok(Err(err)) => Some(match Error::from_port(name, verb.as_str(), &err) {
                timeout @ Error::Timeout { .. } => timeout,
                _ => Error::ActionFailed {
                    service: name.to_owned(),
                    operation: verb.into(),
                    message: format!("{err:#}"),
                },
            }),
            Err(_) => Some(Error::Timeout {
                service: name.to_owned(),
                action: verb.as_str(),
                after: self.install_timeout,
            }),
        };

        let after = self.probe_installed(descriptor).await.map_err(unobserved)?;

        if after == expected && before != expected {
            if let Some(err) = action_error {
                tracing::warn!(service = name, "{verb} took effect despite: {err}");
            }
            return Ok(());
        }

        Err(InstallFailure {
            error: action_error.unwrap_or(Error::InstallNoEffect {
                service: name.to_owned(),
                operation: verb.into(),
                installed: after,
            }),
            installed: Some(after),
        })
    }
}
