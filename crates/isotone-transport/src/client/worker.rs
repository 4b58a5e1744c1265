use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::UnixStream,
    select,
    sync::mpsc,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    api::{IsotoneApi, IsotoneMessage, MessageType},
    error::TransportResult,
};

pub type IpcWorkerSink<IO = UnixStream> = SplitSink<Framed<IO, LengthDelimitedCodec>, Bytes>;
pub type IpcWorkerStream<IO = UnixStream> = SplitStream<Framed<IO, LengthDelimitedCodec>>;

pub type WorkerRequest = (IsotoneMessage, mpsc::Sender<IsotoneMessage>);

/// Owns the client side of the socket: writes requests, routes responses
/// back by id and stream messages to every subscriber.
#[derive(Debug)]
pub struct IpcClientWorker<IO = UnixStream> {
    sink: IpcWorkerSink<IO>,
    stream: IpcWorkerStream<IO>,

    receiver: mpsc::Receiver<WorkerRequest>,
    streams: Vec<mpsc::Sender<IsotoneMessage>>,

    response: HashMap<u32, mpsc::Sender<IsotoneMessage>>,
}

impl<IO> IpcClientWorker<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        sink: IpcWorkerSink<IO>,
        stream: IpcWorkerStream<IO>,
        receiver: mpsc::Receiver<WorkerRequest>,
    ) -> Self {
        Self {
            sink,
            stream,
            receiver,
            streams: Vec::new(),
            response: HashMap::new(),
        }
    }

    async fn handle_socket_message(&mut self, message: BytesMut) -> TransportResult<()> {
        let message = match serde_json::from_slice::<IsotoneMessage>(&message) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!("Dropping malformed message from daemon: {err}");
                return Ok(());
            }
        };

        if message.req_type == MessageType::Stream {
            let mut open = Vec::with_capacity(self.streams.len());
            for stream in self.streams.drain(..) {
                if stream.send(message.clone()).await.is_ok() {
                    open.push(stream);
                }
            }
            self.streams = open;
            return Ok(());
        }

        if let Some(response) = self.response.remove(&message.id) {
            // the caller may have given up waiting
            let _ = response.send(message).await;
        }

        Ok(())
    }

    async fn handle_mpsc_message(
        &mut self,
        message: IsotoneMessage,
        sender: mpsc::Sender<IsotoneMessage>,
    ) -> TransportResult<()> {
        let message_id = message.id;
        let subscribe = message.body == IsotoneApi::Subscribe;

        let bytes = serde_json::to_vec(&message)?;
        self.sink.send(Bytes::from(bytes)).await?;

        if subscribe {
            self.streams.push(sender);
        } else {
            self.response.insert(message_id, sender);
        }

        Ok(())
    }

    /// Run until the socket or the request channel closes.
    ///
    /// # Errors
    /// Returns an error if the socket fails or a request cannot be encoded.
    pub async fn run(&mut self) -> TransportResult<()> {
        loop {
            select! {
                frame = self.stream.next() => match frame {
                    Some(Ok(frame)) => self.handle_socket_message(frame).await?,
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(()),
                },
                request = self.receiver.recv() => match request {
                    Some((message, sender)) => self.handle_mpsc_message(message, sender).await?,
                    None => return Ok(()),
                },
            }
        }
    }
}
