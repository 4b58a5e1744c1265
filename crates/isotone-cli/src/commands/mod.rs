mod daemon_start;
mod daemon_stop;
mod service;
mod status;
mod watch;

use std::time::Duration;

use anyhow::{Context, Result};
use isotone_daemon::DaemonRunner;
use isotone_transport::IpcClient;

pub use daemon_start::daemon_start;
pub use daemon_stop::daemon_stop;
pub use service::service;
pub use status::status;
pub use watch::watch;

const SPAWN_WAIT: Duration = Duration::from_secs(5);
const SPAWN_POLL: Duration = Duration::from_millis(100);

/// Connect to the daemon, starting it in the background first if asked to
/// and it is not running.
async fn connect(daemon_runner: &DaemonRunner, spawn: bool) -> Result<IpcClient> {
    let socket = daemon_runner.socket_path();

    if !IpcClient::check_socket(&socket).await {
        anyhow::ensure!(spawn, "daemon is not running (socket {})", socket.display());

        tracing::debug!("Starting daemon");
        daemon_runner.prepare()?;
        daemon_runner.clear()?;
        daemon_runner.spawn()?;

        let started = tokio::time::Instant::now();
        while !IpcClient::check_socket(&socket).await {
            anyhow::ensure!(
                started.elapsed() < SPAWN_WAIT,
                "daemon did not start within {}s",
                SPAWN_WAIT.as_secs()
            );
            tokio::time::sleep(SPAWN_POLL).await;
        }
    }

    IpcClient::new(&socket)
        .await
        .with_context(|| format!("Failed to connect to the daemon at {}", socket.display()))
}
