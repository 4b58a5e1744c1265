use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Unknown,
    NotInstalled,
    Stopped,
    Starting,
    Running,
    Stopping,
    Restarting,
    Error,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Unknown,
        Phase::NotInstalled,
        Phase::Stopped,
        Phase::Starting,
        Phase::Running,
        Phase::Stopping,
        Phase::Restarting,
        Phase::Error,
    ];

    /// Phases that only exist while a command is in flight.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Phase::Starting | Phase::Stopping | Phase::Restarting)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Unknown => "Unknown",
            Phase::NotInstalled => "NotInstalled",
            Phase::Stopped => "Stopped",
            Phase::Starting => "Starting",
            Phase::Running => "Running",
            Phase::Stopping => "Stopping",
            Phase::Restarting => "Restarting",
            Phase::Error => "Error",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The orchestrator's view of one service.
///
/// `Unknown` and `Error` carry the last known `is_installed` value; every
/// other phase agrees with it (`NotInstalled` iff not installed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub phase: Phase,
    pub is_installed: bool,
    pub last_transition_at: SystemTime,
    pub last_error: Option<String>,
}

impl ServiceState {
    #[must_use]
    pub fn unknown(now: SystemTime) -> Self {
        Self {
            phase: Phase::Unknown,
            is_installed: false,
            last_transition_at: now,
            last_error: None,
        }
    }

    /// Time spent in `Running`, `None` in any other phase.
    #[must_use]
    pub fn uptime(&self, now: SystemTime) -> Option<Duration> {
        if self.phase != Phase::Running {
            return None;
        }
        Some(
            now.duration_since(self.last_transition_at)
                .unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn can_start(&self) -> bool {
        self.is_installed && matches!(self.phase, Phase::Stopped | Phase::Error)
    }

    #[must_use]
    pub fn can_stop(&self) -> bool {
        self.is_installed && matches!(self.phase, Phase::Running | Phase::Error)
    }

    #[must_use]
    pub fn can_restart(&self) -> bool {
        self.is_installed && matches!(self.phase, Phase::Running | Phase::Error)
    }
}

/// A single state transition of one service, as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub service: String,
    pub previous: ServiceState,
    pub current: ServiceState,
}
