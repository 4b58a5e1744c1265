use anyhow::Result;
use isotone_daemon::DaemonRunner;

use crate::{commands::connect, logger::Logger};

pub async fn status(daemon_runner: &DaemonRunner, json: bool) -> Result<()> {
    let mut client = connect(daemon_runner, false).await?;
    let report = client.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        Logger::default().status(&report);
    }

    Ok(())
}
