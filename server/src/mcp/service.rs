use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::tool::ToolRouter,
    model::{ServerCapabilities, ServerInfo},
    tool_handler,
    transport::stdio,
};
use tracing::info;

use crate::ipc::IpcClient;

#[derive(Clone)]
pub struct LiveService {
    client: IpcClient,
    tool_router: ToolRouter<Self>,
}

impl LiveService {
    pub fn new(client: IpcClient) -> Self {
        Self {
            client,
            tool_router: super::tools::make_tool_router(),
        }
    }

    pub fn client(&self) -> &IpcClient {
        &self.client
    }

    /// Serves MCP over stdio until the peer disconnects, then closes the
    /// daemon connection.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let client = self.client.clone();
        let service = self.serve(stdio()).await?;
        let reason = service.waiting().await;
        client.close().await;
        info!(?reason, "mcp session ended");
        reason?;
        Ok(())
    }
}

#[tool_handler]
impl ServerHandler for LiveService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Controls Ableton Live through the AbletonOSC daemon: list and create tracks, \
                 create clips and add notes."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
