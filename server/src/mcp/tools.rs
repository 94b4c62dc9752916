pub mod clips;
pub mod status;
pub mod tracks;

use crate::{ipc::Outcome, mcp::service::LiveService};
use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    model::Content, tool, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Daemon operation that forwards an OSC message to Live.
pub const SEND_MESSAGE: &str = "send_message";

#[tool_router]
impl LiveService {
    #[tool(description = "Daemon connection state and number of requests in flight")]
    pub async fn daemon_status(&self) -> Result<CallToolResult, McpError> {
        self.do_daemon_status()
    }

    #[tool(description = "Get the names of tracks in the Live set")]
    pub async fn get_track_names(
        &self,
        Parameters(req): Parameters<GetTrackNamesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_get_track_names(req.index_min, req.index_max).await
    }

    #[tool(description = "Create a new MIDI track after the given index (-1 appends)")]
    pub async fn create_midi_track(
        &self,
        Parameters(req): Parameters<CreateTrackRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_create_track(tracks::TrackKind::Midi, req.after_index)
            .await
    }

    #[tool(description = "Create a new audio track after the given index (-1 appends)")]
    pub async fn create_audio_track(
        &self,
        Parameters(req): Parameters<CreateTrackRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_create_track(tracks::TrackKind::Audio, req.after_index)
            .await
    }

    #[tool(description = "Delete the track at the given index")]
    pub async fn delete_track(
        &self,
        Parameters(req): Parameters<DeleteTrackRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_delete_track(req.track_index).await
    }

    #[tool(description = "Create an empty MIDI clip in a clip slot")]
    pub async fn create_clip_on_track(
        &self,
        Parameters(req): Parameters<CreateClipRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_create_clip(req).await
    }

    #[tool(description = "Add a note to a MIDI clip")]
    pub async fn add_notes_to_clip(
        &self,
        Parameters(req): Parameters<AddNotesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_add_notes(req).await
    }

    #[tool(description = "Send a raw OSC message through the daemon")]
    pub async fn send_osc_message(
        &self,
        Parameters(req): Parameters<SendOscRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.do_send_osc_message(req.address, req.args).await
    }
}

// Helper to expose router across modules while the generated
// associated function `tool_router()` remains private to this module.
pub(crate) fn make_tool_router() -> rmcp::handler::server::tool::ToolRouter<LiveService> {
    LiveService::tool_router()
}

impl LiveService {
    /// Forwards one OSC message, using the configured call timeout.
    pub(crate) async fn send_osc(&self, address: &str, args: Vec<Value>) -> Outcome {
        self.client()
            .request(SEND_MESSAGE, osc_params(address, args))
            .await
    }
}

pub(crate) fn osc_params(address: &str, args: Vec<Value>) -> Value {
    json!({ "address": address, "args": args })
}

/// Success is returned as JSON text, daemon-side failures as tool errors the
/// model can read.
pub(crate) fn outcome_result(outcome: Outcome) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(payload) => {
            let content = serde_json::to_string(&json!({ "status": "ok", "result": payload }))
                .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
            Ok(CallToolResult::success(vec![Content::text(content)]))
        }
        Err(e) => Ok(error_result(&e)),
    }
}

pub(crate) fn error_result(e: &crate::ipc::IpcError) -> CallToolResult {
    let body = json!({ "status": "error", "kind": e.kind(), "message": e.to_string() });
    CallToolResult::error(vec![Content::text(body.to_string())])
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetTrackNamesRequest {
    pub index_min: Option<i64>,
    pub index_max: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTrackRequest {
    pub after_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteTrackRequest {
    pub track_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateClipRequest {
    pub track_index: i64,
    pub clip_index: i64,
    /// Clip length in beats.
    pub length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddNotesRequest {
    pub track_index: i64,
    pub clip_id: i64,
    pub pitch: i64,
    pub start_at_beat: f64,
    pub length_in_beats: Option<f64>,
    pub velocity: Option<i64>,
    pub mute: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendOscRequest {
    pub address: String,
    #[serde(default)]
    pub args: Vec<Value>,
}
