use futures::future::join_all;
use isotone_types::{Operation, Phase, ServiceCommand, ServiceState, Target};

use crate::{
    deadline::with_deadline,
    error::{AggregateError, ServiceFailure},
    install::{InstallFailure, InstallVerb},
    orchestrator::ServiceOrchestrator,
    Error, Result,
};

fn settle(state: &mut ServiceState, outcome: std::result::Result<Phase, &Error>) {
    match outcome {
        Ok(phase) => {
            state.phase = phase;
            state.is_installed = phase != Phase::NotInstalled;
            state.last_error = None;
        }
        Err(err) => {
            state.phase = Phase::Error;
            state.last_error = Some(err.to_string());
        }
    }
}

impl ServiceOrchestrator {
    async fn control_start(&self, idx: usize) -> Result<()> {
        let descriptor = self.descriptor(idx);
        with_deadline(
            &descriptor.name,
            "start",
            self.timeouts.start,
            self.control.start(&descriptor.unit, self.timeouts.start),
        )
        .await
    }

    async fn control_stop(&self, idx: usize) -> Result<()> {
        let descriptor = self.descriptor(idx);
        with_deadline(
            &descriptor.name,
            "stop",
            self.timeouts.stop,
            self.control.stop(&descriptor.unit, self.timeouts.stop),
        )
        .await
    }

    pub(super) async fn probe_running(&self, idx: usize) -> Result<bool> {
        let descriptor = self.descriptor(idx);
        with_deadline(
            &descriptor.name,
            "probe",
            self.timeouts.probe,
            self.control.is_running(&descriptor.unit),
        )
        .await
    }

    /// Run one of start/stop/restart: enter the transient phase, drive the
    /// control port, settle into `target` or `Error`.
    async fn transition(&self, name: &str, operation: Operation, target: Phase) -> Result<()> {
        let idx = self.locate(name)?;
        let guard = self.begin(idx, operation)?;

        let result = match operation {
            Operation::Start => self.control_start(idx).await,
            Operation::Stop => self.control_stop(idx).await,
            _ => {
                // stop first; a failed stop is the result of the restart
                match self.control_stop(idx).await {
                    Ok(()) => self.control_start(idx).await,
                    Err(err) => Err(err),
                }
            }
        };

        match &result {
            Ok(()) => tracing::info!(service = name, "{operation} succeeded"),
            Err(err) => tracing::warn!(service = name, "{operation} failed: {err}"),
        }
        guard.complete(|state| settle(state, result.as_ref().map(|_| target)));
        result
    }

    /// # Errors
    ///
    /// Unknown name, an operation already in flight, a service known to be
    /// not installed, or a control-port failure or timeout.
    pub async fn start(&self, name: &str) -> Result<()> {
        self.transition(name, Operation::Start, Phase::Running).await
    }

    /// # Errors
    ///
    /// See [`ServiceOrchestrator::start`].
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.transition(name, Operation::Stop, Phase::Stopped).await
    }

    /// Stop, then start. If the stop fails the start is not attempted.
    ///
    /// # Errors
    ///
    /// See [`ServiceOrchestrator::start`].
    pub async fn restart(&self, name: &str) -> Result<()> {
        self.transition(name, Operation::Restart, Phase::Running).await
    }

    /// # Errors
    ///
    /// Unknown name, an operation already in flight, or any failure of the
    /// install action; see [`InstallCoordinator`](crate::install::InstallCoordinator).
    pub async fn install(&self, name: &str) -> Result<()> {
        self.install_action(name, InstallVerb::Install).await
    }

    /// # Errors
    ///
    /// See [`ServiceOrchestrator::install`].
    pub async fn uninstall(&self, name: &str) -> Result<()> {
        self.install_action(name, InstallVerb::Uninstall).await
    }

    async fn install_action(&self, name: &str, verb: InstallVerb) -> Result<()> {
        let idx = self.locate(name)?;
        let guard = self.begin(idx, verb.into())?;

        let (error, installed) = match self.installer.run(self.descriptor(idx), verb).await {
            Ok(()) => (None, Some(verb.expected_installed())),
            Err(InstallFailure { error, installed }) => (Some(error), installed),
        };

        // a failed action still leaves the service in whatever state the
        // last probe saw
        let observed = match installed {
            Some(false) => Some(Ok(Phase::NotInstalled)),
            Some(true) => Some(
                self.probe_running(idx)
                    .await
                    .map(|running| if running { Phase::Running } else { Phase::Stopped }),
            ),
            None => None,
        };

        guard.complete(|state| {
            if let Some(installed) = installed {
                state.is_installed = installed;
            }
            match &observed {
                Some(Ok(phase)) => {
                    state.phase = *phase;
                    state.last_error = error.as_ref().map(ToString::to_string);
                }
                Some(Err(err)) => settle(state, Err(err)),
                None => {
                    state.phase = Phase::Error;
                    state.last_error = error.as_ref().map(ToString::to_string);
                }
            }
        });

        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// [`Error::Aggregate`] listing every service that failed.
    pub async fn start_all(&self) -> Result<()> {
        self.run_all(Operation::Start).await
    }

    /// # Errors
    ///
    /// [`Error::Aggregate`] listing every service that failed.
    pub async fn stop_all(&self) -> Result<()> {
        self.run_all(Operation::Stop).await
    }

    /// # Errors
    ///
    /// [`Error::Aggregate`] listing every service that failed.
    pub async fn restart_all(&self) -> Result<()> {
        self.run_all(Operation::Restart).await
    }

    /// Install every service currently known to be not installed.
    ///
    /// # Errors
    ///
    /// [`Error::Aggregate`] listing every service that failed.
    pub async fn install_all(&self) -> Result<()> {
        self.run_all(Operation::Install).await
    }

    /// # Errors
    ///
    /// [`Error::Aggregate`] listing every service that failed.
    pub async fn uninstall_all(&self) -> Result<()> {
        self.run_all(Operation::Uninstall).await
    }

    /// # Errors
    ///
    /// Whatever the dispatched operation returns.
    pub async fn execute(&self, command: &ServiceCommand) -> Result<()> {
        match &command.target {
            Target::Service(name) => self.run_one(command.operation, name).await,
            Target::All => self.run_all(command.operation).await,
        }
    }

    async fn run_one(&self, operation: Operation, name: &str) -> Result<()> {
        match operation {
            Operation::Start => self.start(name).await,
            Operation::Stop => self.stop(name).await,
            Operation::Restart => self.restart(name).await,
            Operation::Install => self.install(name).await,
            Operation::Uninstall => self.uninstall(name).await,
        }
    }

    /// Best effort: every target is attempted concurrently, failures are
    /// collected. `install` targets the services known to be not installed,
    /// everything else the rest.
    async fn run_all(&self, operation: Operation) -> Result<()> {
        let targets: Vec<String> = self
            .get_all_states()
            .iter()
            .filter(|s| {
                let not_installed = s.state.phase != Phase::Unknown && !s.state.is_installed;
                not_installed == (operation == Operation::Install)
            })
            .map(|s| s.descriptor.name.clone())
            .collect();
        tracing::info!(?targets, "{operation} all");

        let results = join_all(targets.iter().map(|name| self.run_one(operation, name))).await;
        let failures: Vec<ServiceFailure> = targets
            .into_iter()
            .zip(results)
            .filter_map(|(service, result)| {
                result.err().map(|error| ServiceFailure { service, error })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateError {
                operation,
                failures,
            }
            .into())
        }
    }
}
