use anyhow::Result;
use isotone_daemon::DaemonRunner;
use isotone_types::{Operation, ServiceCommand};

use crate::{commands::connect, logger::Logger};

/// Send `<operation> <target>` to the daemon and print the outcome.
pub async fn service(daemon_runner: &DaemonRunner, operation: Operation, target: &str) -> Result<()> {
    let command = ServiceCommand::new(operation, target);
    let mut client = connect(daemon_runner, true).await?;
    let mut logger = Logger::default();

    match client.command(command.clone()).await {
        Ok(()) => {
            logger.system(&format!("{command}: done"));
            Ok(())
        }
        Err(err) => {
            logger.error(&err.to_string());
            Err(anyhow::anyhow!("{command} failed"))
        }
    }
}
