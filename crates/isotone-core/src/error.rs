use std::time::Duration;

use isotone_types::Operation;

use crate::control_port::WaitTimeout;

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown service `{0}`")]
    UnknownService(String),

    #[error("service `{service}` is busy: {operation} already in progress")]
    OperationInProgress {
        service: String,
        operation: Operation,
    },

    #[error("service `{0}` is not installed")]
    NotInstalled(String),

    #[error("service `{0}` is already installed")]
    AlreadyInstalled(String),

    #[error("{action} `{service}` failed: {message}")]
    ControlPort {
        service: String,
        action: &'static str,
        message: String,
    },

    #[error("{action} `{service}` timed out after {}s", .after.as_secs_f32())]
    Timeout {
        service: String,
        action: &'static str,
        after: Duration,
    },

    #[error("{operation} `{service}` had no effect: service is still {}", installed_label(.installed))]
    InstallNoEffect {
        service: String,
        operation: Operation,
        installed: bool,
    },

    #[error("{operation} action for `{service}` failed: {message}")]
    ActionFailed {
        service: String,
        operation: Operation,
        message: String,
    },

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("invalid registry: {0}")]
    InvalidRegistry(String),
}

fn installed_label(installed: &bool) -> &'static str {
    if *installed {
        "installed"
    } else {
        "not installed"
    }
}

impl Error {
    /// Classify a collaborator failure: a [`WaitTimeout`] anywhere in the
    /// chain becomes [`Error::Timeout`], anything else [`Error::ControlPort`].
    pub(crate) fn from_port(service: &str, action: &'static str, err: &anyhow::Error) -> Self {
        if let Some(timeout) = err.chain().find_map(|e| e.downcast_ref::<WaitTimeout>()) {
            return Error::Timeout {
                service: service.to_owned(),
                action,
                after: timeout.waited,
            };
        }

        Error::ControlPort {
            service: service.to_owned(),
            action,
            message: format!("{err:#}"),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

#[derive(Debug)]
pub struct ServiceFailure {
    pub service: String,
    pub error: Error,
}

/// Per-service failures collected by a best-effort `*_all` operation.
#[derive(Debug)]
pub struct AggregateError {
    pub operation: Operation,
    pub failures: Vec<ServiceFailure>,
}

impl AggregateError {
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.service.as_str())
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} all: {} service(s) failed",
            self.operation,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.service, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_is_classified_as_timeout() {
        let err = anyhow::Error::new(WaitTimeout {
            unit: "IsotoneMariaDB".to_owned(),
            target: "stopped",
            waited: Duration::from_secs(30),
        })
        .context("systemctl stop");

        let classified = Error::from_port("db", "stop", &err);
        assert!(classified.is_timeout());
        assert_eq!(classified.to_string(), "stop `db` timed out after 30s");
    }

    #[test]
    fn test_other_failures_are_control_port_errors() {
        let err = anyhow::anyhow!("access denied");
        let classified = Error::from_port("web", "start", &err);
        assert!(matches!(classified, Error::ControlPort { action: "start", .. }));
        assert!(classified.to_string().contains("access denied"));
    }

    #[test]
    fn test_aggregate_lists_failures() {
        let err = AggregateError {
            operation: Operation::Stop,
            failures: vec![ServiceFailure {
                service: "db".to_owned(),
                error: Error::NotInstalled("db".to_owned()),
            }],
        };
        assert_eq!(err.services().collect::<Vec<_>>(), vec!["db"]);
        assert_eq!(
            err.to_string(),
            "stop all: 1 service(s) failed; db: service `db` is not installed"
        );
    }
}
