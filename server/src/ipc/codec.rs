use ableton_proto::{self as proto, Call, Notification, RpcError};
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One classified unit read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response(Response),
    Notification(Notification),
    Malformed { raw: Bytes, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: String,
    pub outcome: Result<Value, RpcError>,
}

pub fn encode_call(call: &Call) -> Result<Bytes, CodecError> {
    Ok(Bytes::from(serde_json::to_vec(call)?))
}

/// Classifies one frame body. Never fails: anything that is not a recognizable
/// response or notification comes back as [`InboundFrame::Malformed`].
pub fn decode_frame(raw: Bytes) -> InboundFrame {
    let value: Value = match serde_json::from_slice(&raw) {
        Ok(v) => v,
        Err(e) => {
            return InboundFrame::Malformed {
                raw,
                reason: format!("invalid json: {e}"),
            };
        }
    };
    let Value::Object(obj) = value else {
        return InboundFrame::Malformed {
            raw,
            reason: "frame is not a json object".into(),
        };
    };
    classify(obj).unwrap_or_else(|reason| InboundFrame::Malformed { raw, reason })
}

fn classify(mut obj: Map<String, Value>) -> Result<InboundFrame, String> {
    // A tagged notification wins even if it happens to carry a `status` field.
    match obj.get("type").and_then(Value::as_str) {
        Some(proto::NOTIFICATION_TYPE) => return notification(&mut obj, "topic"),
        Some(proto::LEGACY_NOTIFICATION_TYPE) => return notification(&mut obj, "address"),
        _ => {}
    }

    if !["result", "error", "status"].iter().any(|k| obj.contains_key(*k)) {
        return Err("unrecognized frame shape".into());
    }

    let id = match obj.remove("id") {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err("response without id".into()),
    };

    let outcome = match obj.remove("error") {
        Some(err) if !err.is_null() => Err(remote_error(err)),
        _ => match obj.remove("result") {
            Some(result) => Ok(extract_payload(result)),
            None => status_outcome(obj),
        },
    };

    Ok(InboundFrame::Response(Response { id, outcome }))
}

fn notification(obj: &mut Map<String, Value>, topic_key: &str) -> Result<InboundFrame, String> {
    let topic = match obj.remove(topic_key) {
        Some(Value::String(s)) => s,
        _ => return Err(format!("notification without `{topic_key}`")),
    };
    let args = match obj.remove("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(args)) => args,
        Some(_) => return Err("notification args must be a list".into()),
    };
    Ok(InboundFrame::Notification(Notification { topic, args }))
}

fn remote_error(err: Value) -> RpcError {
    match err {
        Value::String(message) => RpcError { code: 0, message },
        Value::Object(map) => RpcError {
            code: map.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_default(),
        },
        other => RpcError {
            code: 0,
            message: other.to_string(),
        },
    }
}

// OSC replies put their values under `args`; callers only want those.
fn extract_payload(result: Value) -> Value {
    match result {
        Value::Object(mut map) if map.contains_key("args") => {
            map.remove("args").unwrap_or_default()
        }
        other => other,
    }
}

fn status_outcome(obj: Map<String, Value>) -> Result<Value, RpcError> {
    if obj.get("status").and_then(Value::as_str) == Some("error") {
        return Err(RpcError {
            code: obj.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("daemon reported an error")
                .to_owned(),
        });
    }
    Ok(Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_json(v: Value) -> InboundFrame {
        decode_frame(Bytes::from(serde_json::to_vec(&v).unwrap()))
    }

    #[test]
    fn result_with_args_yields_the_args() {
        let frame = decode_json(json!({"id": "1", "result": {"args": ["Track 1", "Track 2"]}}));
        assert_eq!(
            frame,
            InboundFrame::Response(Response {
                id: "1".into(),
                outcome: Ok(json!(["Track 1", "Track 2"])),
            })
        );
    }

    #[test]
    fn plain_result_is_passed_through() {
        let frame = decode_json(json!({"id": "2", "result": {"tempo": 120}}));
        let InboundFrame::Response(resp) = frame else {
            panic!("expected response");
        };
        assert_eq!(resp.outcome, Ok(json!({"tempo": 120})));
    }

    #[test]
    fn error_object_becomes_remote_error() {
        let frame = decode_json(json!({"id": "7", "error": {"code": 4, "message": "bad index"}}));
        assert_eq!(
            frame,
            InboundFrame::Response(Response {
                id: "7".into(),
                outcome: Err(RpcError {
                    code: 4,
                    message: "bad index".into()
                }),
            })
        );
    }

    #[test]
    fn string_error_and_numeric_id_are_tolerated() {
        let InboundFrame::Response(resp) = decode_json(json!({"id": 9, "error": "boom"})) else {
            panic!("expected response");
        };
        assert_eq!(resp.id, "9");
        assert_eq!(resp.outcome.unwrap_err().message, "boom");
    }

    #[test]
    fn status_only_responses() {
        let InboundFrame::Response(ok) = decode_json(json!({"id": "3", "status": "ok"})) else {
            panic!("expected response");
        };
        assert_eq!(ok.outcome, Ok(json!({"status": "ok"})));

        let InboundFrame::Response(failed) = decode_json(
            json!({"id": "4", "status": "error", "code": 2, "message": "no song"}),
        ) else {
            panic!("expected response");
        };
        assert_eq!(
            failed.outcome,
            Err(RpcError {
                code: 2,
                message: "no song".into()
            })
        );
    }

    #[test]
    fn notifications_are_classified_by_tag() {
        assert_eq!(
            decode_json(json!({"type": "notification", "topic": "/status", "args": []})),
            InboundFrame::Notification(Notification::new("/status", vec![]))
        );
        assert_eq!(
            decode_json(json!({"type": "osc_response", "address": "/live/beat", "args": [3]})),
            InboundFrame::Notification(Notification::new("/live/beat", vec![json!(3)]))
        );
    }

    #[test]
    fn malformed_inputs() {
        for raw in [
            &b"not json"[..],
            b"[1,2,3]",
            br#"{"hello":"world"}"#,
            br#"{"result":1}"#,
            br#"{"type":"notification","args":[]}"#,
            br#"{"type":"notification","topic":"/x","args":5}"#,
        ] {
            assert!(
                matches!(decode_frame(Bytes::from_static(raw)), InboundFrame::Malformed { .. }),
                "expected malformed for {}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn encode_call_is_plain_json() {
        let bytes = encode_call(&Call::new("5", "send_message", json!({"args": []}))).unwrap();
        let back: Call = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.id, "5");
        assert_eq!(back.jsonrpc, proto::PROTOCOL_VERSION);
    }
}
