use anyhow::Result;
use isotone_daemon::DaemonRunner;

use crate::{commands::connect, logger::Logger};

pub async fn daemon_stop(daemon_runner: &DaemonRunner) -> Result<()> {
    let mut client = connect(daemon_runner, false).await?;

    client.shutdown().await?;
    Logger::default().system("Daemon stopped");

    Ok(())
}
