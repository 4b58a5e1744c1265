mod commands;
mod refresh;
mod slot;
#[cfg(test)]
mod tests;

use std::{sync::Arc, time::SystemTime};

use isotone_config::Timeouts;
use isotone_types::{
    AggregateStatus, Operation, ServiceDescriptor, ServiceState, ServiceStatus, StatusReport,
};
use parking_lot::RwLock;

use crate::{
    control_port::ServiceControl,
    install::{CommandInstallAction, InstallAction, InstallCoordinator, InstallStatus},
    publisher::{StatusPublisher, Subscription},
    registry::ServiceRegistry,
    Error, Result,
};

pub use refresh::RefreshReport;
use slot::Slot;

/// One service as seen by readers of [`ServiceOrchestrator::get_all_states`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub descriptor: ServiceDescriptor,
    pub state: ServiceState,
    pub in_flight: Option<Operation>,
}

impl ServiceSnapshot {
    #[must_use]
    pub fn status(&self, now: SystemTime) -> ServiceStatus {
        ServiceStatus::new(&self.descriptor, &self.state, self.in_flight, now)
    }
}

/// Owner of every service's lifecycle state.
///
/// Commands for different services run in parallel; a second command for a
/// service that already has one in flight fails with
/// [`Error::OperationInProgress`]. Reads go through a copy-on-write snapshot
/// and never wait for a command.
pub struct ServiceOrchestrator {
    registry: ServiceRegistry,
    control: Arc<dyn ServiceControl>,
    installer: InstallCoordinator,
    timeouts: Timeouts,
    slots: Vec<Slot>,
    snapshot: RwLock<Arc<Vec<ServiceSnapshot>>>,
    publisher: Arc<StatusPublisher>,
}

pub struct OrchestratorBuilder {
    registry: ServiceRegistry,
    control: Arc<dyn ServiceControl>,
    install_action: Option<Arc<dyn InstallAction>>,
    timeouts: Timeouts,
    publisher: Option<Arc<StatusPublisher>>,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn install_action(mut self, action: Arc<dyn InstallAction>) -> Self {
        self.install_action = Some(action);
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn publisher_capacity(mut self, capacity: usize) -> Self {
        self.publisher = Some(Arc::new(StatusPublisher::new(capacity)));
        self
    }

    #[must_use]
    pub fn build(self) -> ServiceOrchestrator {
        let now = SystemTime::now();
        let install_action = self
            .install_action
            .unwrap_or_else(|| Arc::new(CommandInstallAction::default()));
        let installer = InstallCoordinator::new(
            self.control.clone(),
            install_action,
            self.timeouts.probe,
            self.timeouts.install,
        );

        let slots = self.registry.iter().map(|_| Slot::new(now)).collect();
        let snapshot = self
            .registry
            .iter()
            .map(|descriptor| ServiceSnapshot {
                descriptor: descriptor.clone(),
                state: ServiceState::unknown(now),
                in_flight: None,
            })
            .collect();

        ServiceOrchestrator {
            registry: self.registry,
            control: self.control,
            installer,
            timeouts: self.timeouts,
            slots,
            snapshot: RwLock::new(Arc::new(snapshot)),
            publisher: self.publisher.unwrap_or_else(|| {
                Arc::new(StatusPublisher::new(isotone_config::DEFAULT_PUBLISHER_CAPACITY))
            }),
        }
    }
}

impl ServiceOrchestrator {
    pub fn builder(
        registry: ServiceRegistry,
        control: Arc<dyn ServiceControl>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            control,
            install_action: None,
            timeouts: Timeouts::default(),
            publisher: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }

    pub fn subscribe(&self) -> Subscription {
        self.publisher.subscribe()
    }

    fn descriptor(&self, idx: usize) -> &ServiceDescriptor {
        &self.registry.as_slice()[idx]
    }

    fn locate(&self, name: &str) -> Result<usize> {
        self.registry
            .position(name)
            .ok_or_else(|| Error::UnknownService(name.to_owned()))
    }

    /// # Errors
    ///
    /// [`Error::UnknownService`] for names outside the registry.
    pub fn get_state(&self, name: &str) -> Result<ServiceState> {
        let idx = self.locate(name)?;
        Ok(self.snapshot.read()[idx].state.clone())
    }

    /// Consistent view of every service, in registry order.
    #[must_use]
    pub fn get_all_states(&self) -> Arc<Vec<ServiceSnapshot>> {
        self.snapshot.read().clone()
    }

    #[must_use]
    pub fn aggregate(&self) -> AggregateStatus {
        AggregateStatus::from_phases(self.get_all_states().iter().map(|s| s.state.phase))
    }

    #[must_use]
    pub fn status_report(&self) -> StatusReport {
        let now = SystemTime::now();
        StatusReport::new(
            self.get_all_states()
                .iter()
                .map(|snapshot| snapshot.status(now))
                .collect(),
        )
    }

    /// # Errors
    ///
    /// [`Error::UnknownService`] for names outside the registry.
    pub fn in_flight(&self, name: &str) -> Result<Option<Operation>> {
        let idx = self.locate(name)?;
        Ok(self.snapshot.read()[idx].in_flight)
    }

    /// # Errors
    ///
    /// [`Error::UnknownService`] for names outside the registry.
    pub fn install_status(&self, name: &str) -> Result<InstallStatus> {
        self.locate(name)?;
        Ok(self.installer.status(name))
    }
}
