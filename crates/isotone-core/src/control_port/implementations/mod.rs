mod command;
mod mock;
mod systemd;
mod windows;

pub(crate) use command::{run_command, wait_for_state, CommandOutput};
pub use mock::MockServiceControl;
pub use systemd::SystemdControl;
pub use windows::WindowsServiceControl;
