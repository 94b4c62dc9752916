use std::time::Duration;

use ableton_proto::RpcError;
use serde_json::Value;
use thiserror::Error;

/// Result of one request/response exchange with the daemon.
pub type Outcome = Result<Value, IpcError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("not connected to daemon: {0}")]
    NotConnected(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("response timeout after {0:?}")]
    Timeout(Duration),
    #[error("daemon error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("duplicate request id {0}")]
    DuplicateIdentifier(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),
    #[error("client closed")]
    Closed,
}

impl IpcError {
    /// Stable machine-readable name, used in tool output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected(_) | Self::Connect(_) | Self::ConnectTimeout(_) | Self::Closed => {
                "not_connected"
            }
            Self::ConnectionLost(_) => "connection_lost",
            Self::Timeout(_) => "timeout",
            Self::Remote { .. } => "remote_error",
            Self::Protocol(_) => "protocol_error",
            Self::DuplicateIdentifier(_) => "duplicate_identifier",
        }
    }
}

impl From<RpcError> for IpcError {
    fn from(e: RpcError) -> Self {
        Self::Remote {
            code: e.code,
            message: e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_keeps_code_and_message() {
        let err = IpcError::from(RpcError {
            code: 4,
            message: "bad index".into(),
        });
        assert_eq!(
            err,
            IpcError::Remote {
                code: 4,
                message: "bad index".into()
            }
        );
        assert_eq!(err.kind(), "remote_error");
        assert_eq!(err.to_string(), "daemon error 4: bad index");
    }

    #[test]
    fn connect_failures_read_as_not_connected() {
        assert_eq!(IpcError::Closed.kind(), "not_connected");
        assert_eq!(IpcError::ConnectTimeout(Duration::from_millis(5)).kind(), "not_connected");
        assert_eq!(IpcError::Timeout(Duration::from_millis(50)).kind(), "timeout");
    }
}
