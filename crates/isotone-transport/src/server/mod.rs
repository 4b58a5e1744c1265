pub mod ipc_server;
