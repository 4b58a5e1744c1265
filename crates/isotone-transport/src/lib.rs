pub mod api;
pub mod client;
pub mod error;
pub mod server;

pub use api::{IsotoneApi, IsotoneMessage, MessageType};
pub use client::ipc_client::IpcClient;
pub use error::{TransportError, TransportResult};
pub use server::ipc_server::IpcServer;

/// File name of the daemon socket inside the socket directory.
pub const SOCKET_NAME: &str = "isotone.sock";
