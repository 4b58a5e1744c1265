mod action;
mod coordinator;
mod mock;

pub use action::{ActionOutput, CommandInstallAction, InstallAction, InstallVerb};
pub use coordinator::{InstallCoordinator, InstallFailure, InstallStatus};
pub use mock::MockInstallAction;
