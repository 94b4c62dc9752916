//! Wire types spoken between the MCP bridge and the Ableton Live OSC daemon.
//!
//! Every frame on the stream is a 4-byte big-endian length prefix followed by
//! that many bytes of UTF-8 JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2.0";

/// Size of the length prefix in front of every frame body.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Largest frame body accepted by default.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

pub const NOTIFICATION_TYPE: &str = "notification";

/// Older daemons tag unsolicited OSC traffic this way and put the topic in `address`.
pub const LEGACY_NOTIFICATION_TYPE: &str = "osc_response";

/// Outbound request frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Call {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Structured failure carried by an `error` reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Reply frame as the daemon writes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Reply {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Unsolicited message pushed by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub topic: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Notification {
    pub fn new(topic: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            topic: topic.into(),
            args,
        }
    }

    /// JSON object in the shape the daemon sends, including the `type` tag.
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "type": NOTIFICATION_TYPE,
            "topic": self.topic,
            "args": self.args,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short")]
    Truncated,
    #[error("frame of {0} bytes exceeds the limit")]
    TooLarge(usize),
    #[error("invalid json")]
    Malformed,
}

pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let payload = serde_json::to_vec(message)?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    // Frames above u32::MAX are rejected by every reader long before this matters.
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes the first frame in `data`, returning the message and the number of
/// bytes it occupied.
pub fn decode_frame<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<(T, usize), FrameError> {
    let Some((prefix, rest)) = data.split_first_chunk::<LENGTH_PREFIX_BYTES>() else {
        return Err(FrameError::Truncated);
    };
    let len = u32::from_be_bytes(*prefix) as usize;
    if len > DEFAULT_MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    let payload = rest.get(..len).ok_or(FrameError::Truncated)?;
    let message = serde_json::from_slice(payload).map_err(|_| FrameError::Malformed)?;
    Ok((message, LENGTH_PREFIX_BYTES + len))
}
