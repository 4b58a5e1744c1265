use std::time::Duration;

/// Access to the operating system's service manager.
///
/// Every method takes the OS-level unit name. `start` and `stop` return
/// once the service reports the target state, or fail with a
/// [`WaitTimeout`](super::WaitTimeout) after `timeout`.
#[async_trait::async_trait]
pub trait ServiceControl: Send + Sync {
    /// Whether the service is registered with the service manager.
    async fn is_installed(&self, unit: &str) -> anyhow::Result<bool>;
    /// Whether the service is currently running.
    async fn is_running(&self, unit: &str) -> anyhow::Result<bool>;
    /// Start the service and wait for it to run.
    async fn start(&self, unit: &str, timeout: Duration) -> anyhow::Result<()>;
    /// Stop the service and wait for it to stop.
    async fn stop(&self, unit: &str, timeout: Duration) -> anyhow::Result<()>;
}
