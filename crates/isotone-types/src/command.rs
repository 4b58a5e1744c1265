use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Install,
    Uninstall,
}

impl Operation {
    /// Phase shown while the operation is in flight. Install actions keep
    /// the current phase.
    #[must_use]
    pub fn transient_phase(self) -> Option<Phase> {
        match self {
            Operation::Start => Some(Phase::Starting),
            Operation::Stop => Some(Phase::Stopping),
            Operation::Restart => Some(Phase::Restarting),
            Operation::Install | Operation::Uninstall => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::Install => "install",
            Operation::Uninstall => "uninstall",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Operation::Start),
            "stop" => Ok(Operation::Stop),
            "restart" => Ok(Operation::Restart),
            "install" => Ok(Operation::Install),
            "uninstall" => Ok(Operation::Uninstall),
            other => Err(ParseCommandError::UnknownOperation(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Service(String),
    All,
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        if value == "all" {
            Target::All
        } else {
            Target::Service(value.to_owned())
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Service(name) => f.write_str(name),
            Target::All => f.write_str("all"),
        }
    }
}

/// `<operation> <service>|all`, the command surface the dashboards use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCommand {
    pub operation: Operation,
    pub target: Target,
}

impl ServiceCommand {
    #[must_use]
    pub fn new(operation: Operation, target: impl Into<Target>) -> Self {
        Self {
            operation,
            target: target.into(),
        }
    }
}

impl std::fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.operation, self.target)
    }
}

impl FromStr for ServiceCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let operation = parts.next().ok_or(ParseCommandError::Empty)?.parse()?;
        let target = parts.next().ok_or(ParseCommandError::MissingTarget)?;
        if let Some(extra) = parts.next() {
            return Err(ParseCommandError::Unexpected(extra.to_owned()));
        }

        Ok(ServiceCommand::new(operation, target))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("missing target, expected a service name or `all`")]
    MissingTarget,
    #[error("unexpected argument `{0}`")]
    Unexpected(String),
}
