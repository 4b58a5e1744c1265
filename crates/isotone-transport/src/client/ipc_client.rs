use std::path::Path;

use futures::StreamExt;
use isotone_types::{ServiceCommand, StatusReport};
use tokio::{
    net::UnixStream,
    sync::mpsc::{self, Receiver},
    task::JoinHandle,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    api::{IsotoneApi, IsotoneMessage, MessageType},
    client::worker::{IpcClientWorker, WorkerRequest},
    error::{TransportError, TransportResult},
};

const BUFFER_SIZE: usize = 100;

#[derive(Debug)]
pub struct IpcClient {
    _task: JoinHandle<()>,
    in_socket: mpsc::Sender<WorkerRequest>,
    message_counter: u32,
}

impl IpcClient {
    pub async fn check_socket(path: &Path) -> bool {
        UnixStream::connect(path).await.is_ok()
    }

    /// Connect to the daemon socket.
    ///
    /// # Errors
    /// If the socket connection fails.
    #[tracing::instrument]
    pub async fn new(path: &Path) -> TransportResult<Self> {
        let socket = UnixStream::connect(path).await.map_err(|err| {
            tracing::error!("Failed to connect to IPC socket: {}", err);
            TransportError::Socket(err)
        })?;

        let (tx, rx) = mpsc::channel::<WorkerRequest>(BUFFER_SIZE);

        let task = tokio::spawn(async move {
            let framed = Framed::new(socket, LengthDelimitedCodec::new());
            let (sink, stream) = framed.split();
            if let Err(err) = IpcClientWorker::new(sink, stream, rx).run().await {
                tracing::error!("IPC client worker stopped: {err}");
            }
        });

        Ok(Self {
            _task: task,
            in_socket: tx,
            message_counter: 0,
        })
    }

    fn next_id(&mut self) -> u32 {
        // id 0 is reserved for stream messages
        self.message_counter = self.message_counter.wrapping_add(1).max(1);
        self.message_counter
    }

    /// Send a request and wait for its response. A daemon-side failure is
    /// returned as [`TransportError::Remote`].
    ///
    /// # Errors
    /// If the message could not be sent, the connection closed, or the
    /// daemon answered with an error.
    pub async fn send(&mut self, message: IsotoneApi) -> TransportResult<IsotoneApi> {
        let message_id = self.next_id();

        let (response_tx, mut response_rx) = mpsc::channel::<IsotoneMessage>(1);

        self.in_socket
            .send((
                IsotoneMessage {
                    id: message_id,
                    req_type: MessageType::Request,
                    body: message,
                },
                response_tx,
            ))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))?;

        while let Some(response) = response_rx.recv().await {
            tracing::debug!("Getting message from rx");

            if let IsotoneMessage {
                id,
                req_type: MessageType::Response,
                body,
            } = response
            {
                if id != message_id {
                    continue;
                }

                return match body {
                    IsotoneApi::Error(message) => Err(TransportError::Remote(message)),
                    body => Ok(body),
                };
            }
        }

        Err(TransportError::Send("No response".to_string()))
    }

    pub async fn ping(&mut self) -> bool {
        matches!(self.send(IsotoneApi::Ping).await, Ok(IsotoneApi::Pong))
    }

    /// Run a command such as `start web` or `stop all` and wait for it to
    /// finish.
    ///
    /// # Errors
    /// Returns an error if the command failed for any service.
    pub async fn command(&mut self, command: ServiceCommand) -> TransportResult<()> {
        tracing::debug!(%command, "Sending command");

        match self.send(IsotoneApi::Command(command)).await? {
            IsotoneApi::Ack => Ok(()),
            other => Err(TransportError::UnknownMessage(format!("{other:?}"))),
        }
    }

    /// # Errors
    /// Returns an error if the status cannot be fetched.
    pub async fn status(&mut self) -> TransportResult<StatusReport> {
        match self.send(IsotoneApi::GetStatus).await? {
            IsotoneApi::Status(report) => Ok(report),
            other => Err(TransportError::UnknownMessage(format!("{other:?}"))),
        }
    }

    /// Ask the daemon to stop.
    ///
    /// # Errors
    /// Returns an error if the request cannot be delivered.
    pub async fn shutdown(&mut self) -> TransportResult<()> {
        tracing::debug!("Stopping daemon");

        self.send(IsotoneApi::Shutdown).await?;

        Ok(())
    }

    /// Subscribe to state changes.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be established.
    pub async fn subscribe(&mut self) -> TransportResult<Receiver<IsotoneMessage>> {
        let (response_tx, stream) = mpsc::channel::<IsotoneMessage>(BUFFER_SIZE);

        self.in_socket
            .send((
                IsotoneMessage {
                    id: 0,
                    req_type: MessageType::Request,
                    body: IsotoneApi::Subscribe,
                },
                response_tx,
            ))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))?;

        Ok(stream)
    }
}
