//! Client side of the connection to the Ableton Live OSC daemon.

pub mod client;
pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod path;
mod reader;
pub mod registry;

pub use client::IpcClient;
pub use connection::ConnectionState;
pub use error::{IpcError, Outcome};
