pub mod config;
pub mod ipc;
pub mod mcp;
pub mod observability;
