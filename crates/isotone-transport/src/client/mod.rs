pub mod ipc_client;
pub mod worker;
