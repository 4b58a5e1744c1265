pub type TransportResult<T, E = TransportError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("send error: {0}")]
    Send(String),

    #[error("unexpected message: {0}")]
    UnknownMessage(String),

    /// The daemon handled the request and reported a failure.
    #[error("{0}")]
    Remote(String),
}
