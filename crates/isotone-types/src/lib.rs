mod command;
mod descriptor;
mod state;
mod status;

pub use command::{Operation, ParseCommandError, ServiceCommand, Target};
pub use descriptor::{Category, ServiceDescriptor};
pub use state::{Phase, ServiceState, StateChange};
pub use status::{format_uptime, AggregateStatus, ServiceStatus, StatusReport};
