pub mod control_port;
mod deadline;
mod error;
pub mod install;
mod orchestrator;
mod poller;
mod publisher;
mod registry;
pub mod testing;

pub use control_port::{ServiceControl, SystemdControl, WaitTimeout, WindowsServiceControl};
pub use error::{AggregateError, Error, Result, ServiceFailure};
pub use install::{
    ActionOutput, CommandInstallAction, InstallAction, InstallCoordinator, InstallFailure,
    InstallStatus, InstallVerb,
};
pub use orchestrator::{OrchestratorBuilder, RefreshReport, ServiceOrchestrator, ServiceSnapshot};
pub use poller::{PollerHandle, StatusPoller};
pub use publisher::{StatusObserver, StatusPublisher, Subscription, SubscriptionHandle};
pub use registry::ServiceRegistry;
