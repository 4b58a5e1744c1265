use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{FutureExt, StreamExt};
use isotone_config::{Backend, Config};
use isotone_core::{
    testing::{MockInstallAction, MockServiceControl},
    CommandInstallAction, InstallAction, ServiceControl, ServiceOrchestrator, ServiceRegistry,
    StatusPoller, SystemdControl, WindowsServiceControl,
};
use isotone_transport::{
    IpcServer, IsotoneApi, TransportError, TransportResult, SOCKET_NAME,
};
use tokio_util::sync::CancellationToken;

pub type Result<R, E = DaemonError> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("cannot prepare socket directory {path}: {source}")]
    SocketDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot spawn daemon process: {0}")]
    Spawn(std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Core(#[from] isotone_core::Error),
}

#[derive(Clone)]
struct Context {
    orchestrator: Arc<ServiceOrchestrator>,
    shutdown: CancellationToken,
}

async fn unary_handler(message: IsotoneApi, context: Context) -> TransportResult<IsotoneApi> {
    match message {
        IsotoneApi::Ping => Ok(IsotoneApi::Pong),
        IsotoneApi::Command(command) => {
            tracing::info!(%command, "Executing command");

            context
                .orchestrator
                .execute(&command)
                .await
                .map_err(|err| TransportError::Remote(err.to_string()))?;

            Ok(IsotoneApi::Ack)
        }
        IsotoneApi::GetStatus => Ok(IsotoneApi::Status(context.orchestrator.status_report())),
        IsotoneApi::Shutdown => {
            tracing::info!("Shutdown requested");
            context.shutdown.cancel();

            Ok(IsotoneApi::Ack)
        }
        other => Err(TransportError::UnknownMessage(format!("{other:?}"))),
    }
}

fn stream_handler(context: Context) -> futures::stream::BoxStream<'static, IsotoneApi> {
    tracing::debug!("Client subscribed to state changes");

    context
        .orchestrator
        .subscribe()
        .into_stream()
        .map(IsotoneApi::StateChanged)
        .boxed()
}

/// Build the orchestrator for the configured backend.
///
/// # Errors
/// Returns an error if the service catalog is invalid.
pub fn build_orchestrator(config: &Config) -> Result<ServiceOrchestrator> {
    let registry = ServiceRegistry::from_config(config)?;

    let (control, action): (Arc<dyn ServiceControl>, Arc<dyn InstallAction>) =
        match config.backend {
            Backend::Systemd => (
                Arc::new(SystemdControl::new()),
                Arc::new(CommandInstallAction::from_config(config)),
            ),
            Backend::Windows => (
                Arc::new(WindowsServiceControl::new()),
                Arc::new(CommandInstallAction::from_config(config)),
            ),
            Backend::Simulated => {
                let control = Arc::new(
                    config
                        .descriptors()
                        .fold(MockServiceControl::new(), |control, descriptor| {
                            control.with_unit(&descriptor.unit, false, false)
                        }),
                );
                let action = Arc::new(MockInstallAction::new(control.clone()));
                (control, action)
            }
        };

    Ok(ServiceOrchestrator::builder(registry, control)
        .install_action(action)
        .timeouts(config.timeouts)
        .publisher_capacity(config.publisher_capacity)
        .build())
}

#[derive(Debug)]
pub struct DaemonRunner {
    config: Config,
    config_path: Option<PathBuf>,
}

impl DaemonRunner {
    #[must_use]
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        DaemonRunner {
            config,
            config_path,
        }
    }

    #[must_use]
    pub fn socket_dir(&self) -> &Path {
        &self.config.socket_dir
    }

    /// Get the socket path.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.config.socket_dir.join(SOCKET_NAME)
    }

    /// Create the socket directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(self.socket_dir()).map_err(|source| DaemonError::SocketDir {
            path: self.socket_dir().to_path_buf(),
            source,
        })
    }

    /// Remove a stale socket file.
    ///
    /// # Errors
    /// Returns an error if the socket file exists and cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(self.socket_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DaemonError::SocketDir {
                path: self.socket_path(),
                source,
            }),
        }
    }

    /// Spawn the daemon as a detached process of the current executable.
    ///
    /// # Errors
    /// Returns an error if the daemon process cannot be spawned.
    pub fn spawn(&self) -> Result<()> {
        let exe = std::env::current_exe().map_err(DaemonError::Spawn)?;
        let mut command = std::process::Command::new(exe);
        command.arg("daemon");
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }
        command
            .arg("--socket-dir")
            .arg(self.socket_dir())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .spawn()
            .map_err(DaemonError::Spawn)?;

        Ok(())
    }

    /// Run the daemon in the foreground until a `Shutdown` request or
    /// Ctrl+C.
    ///
    /// # Errors
    /// Returns an error if the orchestrator or the IPC server cannot be set up.
    #[tracing::instrument(skip_all)]
    pub async fn start(&self) -> Result<()> {
        self.start_with_shutdown(CancellationToken::new()).await
    }

    /// Like [`DaemonRunner::start`], stopping when `shutdown` is cancelled.
    ///
    /// # Errors
    /// See [`DaemonRunner::start`].
    #[tracing::instrument(skip_all)]
    pub async fn start_with_shutdown(&self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(backend = ?self.config.backend, "Starting daemon process...");
        let orchestrator = Arc::new(build_orchestrator(&self.config)?);

        let report = orchestrator.refresh().await;
        tracing::info!(
            failed = report.failed,
            "Initial refresh: {}",
            orchestrator.aggregate()
        );

        if self.config.auto_start {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(err) = orchestrator.start_all().await {
                    tracing::warn!("Auto start incomplete: {err}");
                }
            });
        }

        let poller = StatusPoller::new(self.config.poll_interval)
            .spawn(orchestrator.clone(), shutdown.child_token());

        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    result = tokio::signal::ctrl_c() => {
                        if result.is_ok() {
                            tracing::info!("Ctrl+C received");
                            shutdown.cancel();
                        }
                    }
                }
            });
        }

        let server = IpcServer::new(
            &self.socket_path(),
            Context {
                orchestrator,
                shutdown: shutdown.clone(),
            },
        )?
        .add_unary_handler(Arc::new(|api: IsotoneApi, context: Context| {
            unary_handler(api, context).boxed()
        }))
        .add_stream_handler(Arc::new(stream_handler))
        .with_shutdown(shutdown.clone());
        tracing::info!(socket = %self.socket_path().display(), "Listening");

        server.start().await;

        shutdown.cancel();
        poller.shutdown().await;
        self.clear()?;
        tracing::info!("Daemon stopped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use isotone_transport::IpcClient;
    use isotone_types::{Operation, Phase, ServiceCommand, Target};

    use super::*;

    fn simulated() -> Config {
        Config {
            backend: Backend::Simulated,
            ..Config::default()
        }
    }

    fn context() -> Context {
        Context {
            orchestrator: Arc::new(build_orchestrator(&simulated()).unwrap()),
            shutdown: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_unary_handler() {
        let context = context();
        context.orchestrator.refresh().await;

        assert_eq!(
            unary_handler(IsotoneApi::Ping, context.clone()).await.unwrap(),
            IsotoneApi::Pong
        );

        let install = ServiceCommand::new(Operation::Install, Target::All);
        assert_eq!(
            unary_handler(IsotoneApi::Command(install), context.clone())
                .await
                .unwrap(),
            IsotoneApi::Ack
        );

        let IsotoneApi::Status(report) = unary_handler(IsotoneApi::GetStatus, context.clone())
            .await
            .unwrap()
        else {
            panic!("expected status");
        };
        assert_eq!(report.aggregate.count(Phase::Stopped), 3);

        let unknown = ServiceCommand::new(Operation::Start, "ftp");
        let err = unary_handler(IsotoneApi::Command(unknown), context.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Remote(message) if message.contains("ftp")));

        unary_handler(IsotoneApi::Shutdown, context.clone())
            .await
            .unwrap();
        assert!(context.shutdown.is_cancelled());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_daemon_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            socket_dir: dir.path().to_path_buf(),
            ..simulated()
        };
        let runner = DaemonRunner::new(config, None);
        runner.prepare().unwrap();
        let socket = runner.socket_path();

        let daemon = tokio::spawn(async move { runner.start().await });

        let mut attempts = 0;
        while !IpcClient::check_socket(&socket).await {
            attempts += 1;
            assert!(attempts < 100, "daemon did not come up");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut client = IpcClient::new(&socket).await.unwrap();
        assert!(client.ping().await);

        let mut events = client.subscribe().await.unwrap();
        client.command("install web".parse().unwrap()).await.unwrap();
        client.command("start web".parse().unwrap()).await.unwrap();

        let report = client.status().await.unwrap();
        assert_eq!(report.services[0].phase, Phase::Running);
        assert_eq!(report.aggregate.count(Phase::NotInstalled), 2);

        let first = events.recv().await.unwrap();
        let IsotoneApi::StateChanged(change) = first.body else {
            panic!("expected state change, got {:?}", first.body);
        };
        assert_eq!(change.service, "web");

        client.shutdown().await.unwrap();
        daemon.await.unwrap().unwrap();
        assert!(!socket.exists());
    }
}
