//! Scriptable collaborators for tests and the simulated backend.

pub use crate::{control_port::MockServiceControl, install::MockInstallAction};
