use isotone_types::{ServiceCommand, StateChange, StatusReport};
use serde::{Deserialize, Serialize};

/// Wire envelope. Responses echo the request `id`; stream messages use id 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsotoneMessage {
    pub id: u32,
    pub req_type: MessageType,
    pub body: IsotoneApi,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    Stream,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub enum IsotoneApi {
    Ping,
    Pong,
    Command(ServiceCommand),
    GetStatus,
    Status(StatusReport),
    /// Start streaming `StateChanged` messages on this connection.
    Subscribe,
    StateChanged(StateChange),
    Shutdown,
    Ack,
    Error(String),
}
