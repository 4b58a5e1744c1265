use std::{future::Future, time::Duration};

use crate::{Error, Result};

/// Extra time granted on top of a collaborator's own timeout, so that an
/// implementation which honours its timeout reports it before we give up.
pub(crate) const GRACE: Duration = Duration::from_secs(2);

/// Await a collaborator call, but never longer than `timeout + GRACE`.
pub(crate) async fn with_deadline<T>(
    service: &str,
    action: &'static str,
    timeout: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout + GRACE, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Error::from_port(service, action, &err)),
        Err(_) => Err(Error::Timeout {
            service: service.to_owned(),
            action,
            after: timeout,
        }),
    }
}
