use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use ableton_proto::{Call, Notification};
use serde_json::Value;
use tokio::{
    sync::{broadcast, oneshot, watch},
    time::{self, Instant},
};
use tracing::{debug, warn};

use super::{
    connection::{Connection, ConnectionState},
    dispatch::{NotificationDispatcher, NotificationHandler},
    registry::PendingCalls,
};
use crate::config::IpcConfig;

pub use super::error::{IpcError, Outcome};

/// Handle to the daemon connection. Cloning is cheap and every clone shares
/// the same connection, pending calls and notification routing.
#[derive(Clone)]
pub struct IpcClient {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: IpcConfig,
    connection: Connection,
    pending: Arc<PendingCalls>,
    dispatcher: Arc<NotificationDispatcher>,
    next_id: AtomicU64,
}

// Removes the registry entry if the caller stops waiting early.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.forget(self.id) {
            debug!(id = self.id, "request abandoned before settling");
        }
    }
}

impl IpcClient {
    /// Builds a client without touching the network; the first request connects.
    pub fn new(cfg: IpcConfig) -> Self {
        let pending = Arc::new(PendingCalls::new());
        let dispatcher = Arc::new(NotificationDispatcher::new());
        let connection = Connection::new(
            cfg.endpoint.clone(),
            cfg.connect_timeout,
            cfg.max_frame_length,
            pending.clone(),
            dispatcher.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                cfg,
                connection,
                pending,
                dispatcher,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub async fn connect(cfg: IpcConfig) -> Result<Self, IpcError> {
        let client = Self::new(cfg);
        client.inner.connection.connect().await?;
        Ok(client)
    }

    pub fn config(&self) -> &IpcConfig {
        &self.inner.cfg
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe_state()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.pending.contains(id)
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.dispatcher.subscribe()
    }

    pub fn on_notification<H: NotificationHandler>(&self, topic: impl Into<String>, handler: H) {
        self.inner.dispatcher.register(topic, handler);
    }

    fn next_id(&self) -> String {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Connects if needed. Any failure is reported as `NotConnected`.
    pub async fn ensure_connected(&self) -> Result<(), IpcError> {
        if self.inner.connection.is_connected() {
            return Ok(());
        }
        self.inner.connection.connect().await.map_err(|e| match e {
            IpcError::Closed => IpcError::NotConnected("client closed".into()),
            other => IpcError::NotConnected(other.to_string()),
        })
    }

    /// Sends `operation` and waits up to `timeout` for its response.
    ///
    /// Exactly one outcome is produced per call. When the timeout and the
    /// response land together, whichever settles the registry entry first wins.
    pub async fn send_request(&self, operation: &str, params: Value, timeout: Duration) -> Outcome {
        self.ensure_connected().await?;

        let id = self.next_id();
        let deadline = Instant::now() + timeout;
        let mut rx = self.inner.pending.register(&id, deadline)?;
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id: &id,
        };

        debug!(id = %id, operation, "sending request");
        let call = Call::new(id.clone(), operation, params);
        // A daemon that stops reading stalls the write; the deadline covers it too.
        match time::timeout_at(deadline, self.inner.connection.transmit(call)).await {
            Ok(sent) => sent?,
            Err(_elapsed) => {
                warn!(id = %id, operation, ?timeout, "request timed out while sending");
                return self.settle_expired(&id, rx, timeout).await;
            }
        }

        match time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_dropped)) => Err(IpcError::ConnectionLost("request abandoned".into())),
            Err(_elapsed) => {
                warn!(id = %id, operation, ?timeout, "request timed out");
                self.settle_expired(&id, rx, timeout).await
            }
        }
    }

    async fn settle_expired(
        &self,
        id: &str,
        rx: oneshot::Receiver<Outcome>,
        timeout: Duration,
    ) -> Outcome {
        if self.inner.pending.expire(id) {
            return Err(IpcError::Timeout(timeout));
        }
        // Settled concurrently; the outcome is already in flight to us.
        rx.await
            .unwrap_or_else(|_| Err(IpcError::ConnectionLost("request abandoned".into())))
    }

    /// [`send_request`](Self::send_request) with the configured call timeout.
    pub async fn request(&self, operation: &str, params: Value) -> Outcome {
        self.send_request(operation, params, self.inner.cfg.call_timeout)
            .await
    }

    /// Closes the connection for good. Later requests fail with `NotConnected`.
    pub async fn close(&self) {
        self.inner.connection.close().await;
    }
}
