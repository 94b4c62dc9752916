use crate::mcp::service::LiveService;
use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::outcome_result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatusOut {
    pub state: String,
    pub connected: bool,
    pub endpoint: String,
    pub pending_requests: usize,
    pub call_timeout_ms: u64,
}

impl LiveService {
    pub(super) fn do_daemon_status(&self) -> Result<CallToolResult, McpError> {
        let client = self.client();
        let state = client.state();
        let out = DaemonStatusOut {
            state: state.to_string(),
            connected: state == crate::ipc::ConnectionState::Connected,
            endpoint: client.config().endpoint.to_string(),
            pending_requests: client.pending_count(),
            call_timeout_ms: u64::try_from(client.config().call_timeout.as_millis())
                .unwrap_or(u64::MAX),
        };

        let content = serde_json::to_string(&out)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(content)]))
    }

    pub(super) async fn do_send_osc_message(
        &self,
        address: String,
        args: Vec<Value>,
    ) -> Result<CallToolResult, McpError> {
        if !address.starts_with('/') {
            return Err(McpError::invalid_params(
                format!("OSC address must start with '/': {address}"),
                None,
            ));
        }
        outcome_result(self.send_osc(&address, args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::IpcConfig, ipc::IpcClient};

    #[tokio::test]
    async fn status_reports_disconnected_client() {
        let service = LiveService::new(IpcClient::new(IpcConfig::default()));
        let result = service.do_daemon_status().unwrap();
        let json = serde_json::to_value(&result).unwrap();
        let out: DaemonStatusOut =
            serde_json::from_str(json["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(out.state, "disconnected");
        assert!(!out.connected);
        assert_eq!(out.endpoint, "tcp://127.0.0.1:65432");
        assert_eq!(out.pending_requests, 0);
        assert_eq!(out.call_timeout_ms, 7000);
    }

    #[tokio::test]
    async fn relative_osc_address_is_rejected() {
        let service = LiveService::new(IpcClient::new(IpcConfig::default()));
        assert!(
            service
                .do_send_osc_message("live/song".into(), vec![])
                .await
                .is_err()
        );
    }
}
