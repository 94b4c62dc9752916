//! Scriptable stand-in for the Live OSC daemon.

#![allow(dead_code)]

use std::time::Duration;

use ableton_mcp::{config::IpcConfig, ipc::path::Endpoint};
use ableton_proto::Call;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub type DaemonConn = Framed<TcpStream, LengthDelimitedCodec>;

pub struct MockDaemon {
    listener: TcpListener,
}

impl MockDaemon {
    pub async fn bind() -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    pub fn config(&self) -> anyhow::Result<IpcConfig> {
        Ok(IpcConfig {
            endpoint: Endpoint::Tcp(self.listener.local_addr()?.to_string()),
            connect_timeout: Duration::from_millis(500),
            call_timeout: Duration::from_secs(2),
            ..IpcConfig::default()
        })
    }

    pub async fn accept(&self) -> anyhow::Result<DaemonConn> {
        let (stream, _) =
            tokio::time::timeout(Duration::from_secs(2), self.listener.accept()).await??;
        Ok(Framed::new(stream, LengthDelimitedCodec::new()))
    }
}

pub async fn next_call(conn: &mut DaemonConn) -> anyhow::Result<Call> {
    let frame = tokio::time::timeout(Duration::from_secs(2), conn.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("client closed the stream"))??;
    Ok(serde_json::from_slice(&frame)?)
}

pub async fn send_json(conn: &mut DaemonConn, value: &Value) -> anyhow::Result<()> {
    conn.send(Bytes::from(serde_json::to_vec(value)?)).await?;
    Ok(())
}

pub async fn send_raw(conn: &mut DaemonConn, body: &'static [u8]) -> anyhow::Result<()> {
    conn.send(Bytes::from_static(body)).await?;
    Ok(())
}

/// Writes an already length-prefixed frame one byte at a time.
pub async fn dribble(conn: &mut DaemonConn, framed_bytes: &[u8]) -> anyhow::Result<()> {
    let stream = conn.get_mut();
    for byte in framed_bytes {
        stream.write_all(std::slice::from_ref(byte)).await?;
        stream.flush().await?;
        tokio::task::yield_now().await;
    }
    Ok(())
}
