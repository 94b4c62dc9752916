use crate::mcp::service::LiveService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::{Value, json};

use super::{AddNotesRequest, CreateClipRequest, outcome_result};

pub const CREATE_CLIP: &str = "/live/clip_slot/create_clip";
pub const ADD_NOTES: &str = "/live/clip/add/notes";

const DEFAULT_NOTE_LENGTH: f64 = 4.0;
const DEFAULT_VELOCITY: i64 = 100;

impl LiveService {
    pub(super) async fn do_create_clip(
        &self,
        req: CreateClipRequest,
    ) -> Result<CallToolResult, McpError> {
        let args = vec![json!(req.track_index), json!(req.clip_index), json!(req.length)];
        outcome_result(self.send_osc(CREATE_CLIP, args).await)
    }

    pub(super) async fn do_add_notes(&self, req: AddNotesRequest) -> Result<CallToolResult, McpError> {
        outcome_result(self.send_osc(ADD_NOTES, note_args(&req)).await)
    }
}

// Argument order expected by /live/clip/add/notes.
pub(crate) fn note_args(req: &AddNotesRequest) -> Vec<Value> {
    vec![
        json!(req.track_index),
        json!(req.clip_id),
        json!(req.pitch),
        json!(req.start_at_beat),
        json!(req.length_in_beats.unwrap_or(DEFAULT_NOTE_LENGTH)),
        json!(req.velocity.unwrap_or(DEFAULT_VELOCITY)),
        json!(req.mute.unwrap_or(false)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_defaults_fill_missing_fields() {
        let req = AddNotesRequest {
            track_index: 0,
            clip_id: 1,
            pitch: 60,
            start_at_beat: 0.5,
            length_in_beats: None,
            velocity: None,
            mute: None,
        };
        assert_eq!(
            note_args(&req),
            vec![json!(0), json!(1), json!(60), json!(0.5), json!(4.0), json!(100), json!(false)]
        );
    }

    #[test]
    fn explicit_note_fields_are_kept() {
        let req = AddNotesRequest {
            track_index: 2,
            clip_id: 0,
            pitch: 64,
            start_at_beat: 1.0,
            length_in_beats: Some(0.25),
            velocity: Some(90),
            mute: Some(true),
        };
        let args = note_args(&req);
        assert_eq!(args[4], json!(0.25));
        assert_eq!(args[5], json!(90));
        assert_eq!(args[6], json!(true));
    }
}
