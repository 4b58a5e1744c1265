mod base;
mod implementations;
mod types;

pub use base::ServiceControl;
pub(crate) use implementations::run_command;
pub use implementations::{MockServiceControl, SystemdControl, WindowsServiceControl};
pub use types::WaitTimeout;
