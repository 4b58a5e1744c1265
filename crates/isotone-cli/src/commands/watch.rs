use anyhow::Result;
use isotone_daemon::DaemonRunner;
use isotone_transport::IsotoneApi;
use tokio::signal;

use crate::{commands::connect, logger::Logger};

pub async fn watch(daemon_runner: &DaemonRunner) -> Result<()> {
    let mut client = connect(daemon_runner, false).await?;
    let mut logger = Logger::default();

    logger.status(&client.status().await?);
    let mut events = client.subscribe().await?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => return Ok(()),

            maybe_msg = events.recv() => {
                let Some(message) = maybe_msg else {
                    logger.system("Daemon closed the connection");
                    return Ok(());
                };
                if let IsotoneApi::StateChanged(change) = message.body {
                    logger.change(&change);
                }
            }
        }
    }
}
