use crate::mcp::service::LiveService;
use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use serde_json::{Value, json};
use tracing::debug;

use super::{error_result, outcome_result};

pub const GET_TRACK_NAMES: &str = "/live/song/get/track_names";
pub const CREATE_MIDI_TRACK: &str = "/live/song/create_midi_track";
pub const CREATE_AUDIO_TRACK: &str = "/live/song/create_audio_track";
pub const DELETE_TRACK: &str = "/live/song/delete_track";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Midi,
    Audio,
}

impl TrackKind {
    fn address(self) -> &'static str {
        match self {
            TrackKind::Midi => CREATE_MIDI_TRACK,
            TrackKind::Audio => CREATE_AUDIO_TRACK,
        }
    }
}

impl LiveService {
    pub(super) async fn do_get_track_names(
        &self,
        index_min: Option<i64>,
        index_max: Option<i64>,
    ) -> Result<CallToolResult, McpError> {
        let args = track_range_args(index_min, index_max);
        match self.send_osc(GET_TRACK_NAMES, args).await {
            Ok(payload) => Ok(CallToolResult::success(vec![Content::text(
                format_track_names(&payload),
            )])),
            Err(e) => Ok(error_result(&e)),
        }
    }

    pub(super) async fn do_create_track(
        &self,
        kind: TrackKind,
        after_index: Option<i64>,
    ) -> Result<CallToolResult, McpError> {
        let after_index = after_index.unwrap_or(-1);
        debug!(?kind, after_index, "creating track");
        outcome_result(self.send_osc(kind.address(), vec![json!(after_index)]).await)
    }

    pub(super) async fn do_delete_track(&self, track_index: i64) -> Result<CallToolResult, McpError> {
        outcome_result(self.send_osc(DELETE_TRACK, vec![json!(track_index)]).await)
    }
}

/// The daemon only honours a range when both bounds are given.
pub(crate) fn track_range_args(index_min: Option<i64>, index_max: Option<i64>) -> Vec<Value> {
    match (index_min, index_max) {
        (Some(min), Some(max)) => vec![json!(min), json!(max)],
        _ => Vec::new(),
    }
}

pub(crate) fn format_track_names(payload: &Value) -> String {
    let names: Vec<String> = match payload {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };
    if names.is_empty() {
        "No tracks found".to_string()
    } else {
        format!("Track Names: {}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_needs_both_bounds() {
        assert_eq!(track_range_args(Some(0), Some(3)), vec![json!(0), json!(3)]);
        assert!(track_range_args(Some(0), None).is_empty());
        assert!(track_range_args(None, None).is_empty());
    }

    #[test]
    fn formats_names() {
        assert_eq!(
            format_track_names(&json!(["Track 1", "Track 2"])),
            "Track Names: Track 1, Track 2"
        );
        assert_eq!(format_track_names(&json!([])), "No tracks found");
        assert_eq!(format_track_names(&json!(null)), "No tracks found");
        assert_eq!(format_track_names(&json!({})), "No tracks found");
    }

    #[test]
    fn track_kind_addresses() {
        assert_eq!(TrackKind::Midi.address(), "/live/song/create_midi_track");
        assert_eq!(TrackKind::Audio.address(), "/live/song/create_audio_track");
    }
}
