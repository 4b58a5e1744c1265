use std::{fmt::Debug, path::Path, sync::Arc};

use bytes::Bytes;
use futures::{future::BoxFuture, stream::BoxStream, SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::UnixListener,
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::{
    codec::{Framed, LengthDelimitedCodec},
    sync::CancellationToken,
};

use crate::{
    api::{IsotoneApi, IsotoneMessage, MessageType},
    error::{TransportError, TransportResult},
};

const BUFFER_SIZE: usize = 64;

pub type UnaryHandler<C> =
    Arc<dyn Fn(IsotoneApi, C) -> BoxFuture<'static, TransportResult<IsotoneApi>> + Send + Sync>;

/// Called once per `Subscribe` request; the stream is forwarded to that
/// connection until either side goes away.
pub type StreamHandler<C> = Arc<dyn Fn(C) -> BoxStream<'static, IsotoneApi> + Send + Sync>;

pub struct IpcServer<C: Clone + Send + Sync> {
    socket: UnixListener,
    unary_handler: Option<UnaryHandler<C>>,
    stream_handler: Option<StreamHandler<C>>,
    context: C,
    shutdown: CancellationToken,
}

impl<C: Clone + Debug + Send + Sync + 'static> Debug for IpcServer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcServer")
            .field("socket", &self.socket)
            .field("context", &self.context)
            .field("unary_handler", &"[fn]")
            .field("stream_handler", &"[fn]")
            .finish()
    }
}

impl<C: Clone + Send + Sync + 'static> IpcServer<C> {
    /// Create a new IPC server.
    ///
    /// # Errors
    /// Returns a `TransportError` if the Unix socket cannot be bound.
    pub fn new(path: &Path, context: C) -> TransportResult<Self> {
        let socket = UnixListener::bind(path).map_err(TransportError::Socket)?;

        Ok(Self {
            socket,
            unary_handler: None,
            stream_handler: None,
            context,
            shutdown: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn add_unary_handler(mut self, handler: UnaryHandler<C>) -> Self {
        self.unary_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn add_stream_handler(mut self, handler: StreamHandler<C>) -> Self {
        self.stream_handler = Some(handler);
        self
    }

    /// Stop accepting connections once `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Accept connections until shut down. Each connection is served on its
    /// own task.
    pub async fn start(self) {
        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.socket.accept() => accepted,
            };

            match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(serve_connection(
                        stream,
                        self.unary_handler.clone(),
                        self.stream_handler.clone(),
                        self.context.clone(),
                    ));
                }
                Err(err) => {
                    tracing::error!("Failed to accept IPC connection: {err}");
                    break;
                }
            }
        }
        tracing::debug!("IPC server stopped accepting connections");
    }
}

/// Serve one connection. Requests are handled concurrently, so a slow
/// command does not hold up a status query on the same connection.
pub(crate) async fn serve_connection<IO, C>(
    io: IO,
    unary_handler: Option<UnaryHandler<C>>,
    stream_handler: Option<StreamHandler<C>>,
    context: C,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    let (mut sink, mut frames) = Framed::new(io, LengthDelimitedCodec::new()).split();
    let (tx, mut rx) = mpsc::channel::<IsotoneMessage>(BUFFER_SIZE);

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let serialized = match serde_json::to_vec(&message) {
                Ok(serialized) => serialized,
                Err(err) => {
                    tracing::error!("Failed to serialize message: {err}");
                    continue;
                }
            };
            if sink.send(Bytes::from(serialized)).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions = JoinSet::new();

    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("IPC connection failed: {err}");
                break;
            }
        };
        let message = match serde_json::from_slice::<IsotoneMessage>(&frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!("Dropping malformed request: {err}");
                continue;
            }
        };

        if message.body == IsotoneApi::Subscribe {
            let Some(handler) = stream_handler.as_ref() else {
                continue;
            };
            let mut events = handler(context.clone());
            let tx = tx.clone();
            subscriptions.spawn(async move {
                while let Some(event) = events.next().await {
                    let message = IsotoneMessage {
                        id: 0,
                        req_type: MessageType::Stream,
                        body: event,
                    };
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
            });
            continue;
        }

        let handler = unary_handler.clone();
        let context = context.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let body = match handler {
                Some(handler) => handler(message.body, context)
                    .await
                    .unwrap_or_else(|err| IsotoneApi::Error(err.to_string())),
                None => IsotoneApi::Error("unsupported request".to_owned()),
            };
            let response = IsotoneMessage {
                id: message.id,
                req_type: MessageType::Response,
                body,
            };
            let _ = tx.send(response).await;
        });
    }

    // in-flight requests finish on their own; subscriptions end with the peer
    subscriptions.abort_all();
    drop(tx);
    let _ = writer.await;
}
