//! MCP server for Ableton Live over stdio, backed by the OSC daemon.

use ableton_mcp::{config::ServerConfig, ipc::IpcClient, mcp::service::LiveService, observability};
use clap::Parser;
use tracing::{info, warn};

/// CLI arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Daemon endpoint (tcp://host:port, unix:///path or host:port)
    #[arg(long)]
    endpoint: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    call_timeout_ms: Option<u64>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    observability::init_tracing(args.debug);

    let cfg = ServerConfig::load().with_overrides(args.endpoint.as_deref(), args.call_timeout_ms);
    info!(endpoint = %cfg.ipc.endpoint, "starting ableton-mcp");

    let client = IpcClient::new(cfg.ipc.clone());
    if cfg.ipc.connect_on_start
        && let Err(e) = client.ensure_connected().await
    {
        warn!(error = %e, "daemon not reachable yet; will retry on first request");
    }

    LiveService::new(client).serve_stdio().await
}
