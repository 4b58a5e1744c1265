use anyhow::Result;
use isotone_daemon::DaemonRunner;
use isotone_transport::IpcClient;

use crate::logger::Logger;

pub async fn daemon_start(daemon_runner: &DaemonRunner) -> Result<()> {
    let mut logger = Logger::default();

    if IpcClient::check_socket(&daemon_runner.socket_path()).await {
        logger.error("Daemon already running");
        return Ok(());
    }

    daemon_runner.prepare()?;
    daemon_runner.clear()?;
    daemon_runner.start().await?;

    Ok(())
}
