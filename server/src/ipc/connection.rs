use std::{
    fmt, io,
    sync::{
        Arc, Mutex as StdMutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use ableton_proto::Call;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net,
    sync::{Mutex, watch},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    dispatch::NotificationDispatcher,
    error::IpcError,
    framing::{self, FramedIo},
    path::Endpoint,
    reader::{self, ReaderContext, ReaderExit},
    registry::PendingCalls,
};

// Trait for stream types that can carry daemon frames
pub(crate) trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> IpcStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub(crate) type BoxedStream = Box<dyn IpcStream>;
pub(crate) type FrameSink = SplitSink<FramedIo<BoxedStream>, Call>;
pub(crate) type FrameSource = SplitStream<FramedIo<BoxedStream>>;

const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
struct ActiveTransport {
    generation: u64,
    sink: Arc<Mutex<FrameSink>>,
    cancel: CancellationToken,
}

/// State shared by the connection, its writers and its reader task.
///
/// `generation` identifies one connect cycle so that a reader or writer of an
/// old transport can never tear down its successor.
pub(crate) struct Link {
    state: watch::Sender<ConnectionState>,
    active: StdMutex<Option<ActiveTransport>>,
    generations: AtomicU64,
}

impl Link {
    pub(crate) fn new() -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            active: StdMutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveTransport>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "connection state");
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Installs a freshly opened transport and marks the link connected.
    pub(crate) fn activate(&self, sink: Arc<Mutex<FrameSink>>, cancel: CancellationToken) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        *self.active() = Some(ActiveTransport {
            generation,
            sink,
            cancel,
        });
        self.set_state(ConnectionState::Connected);
        generation
    }

    fn take_active(&self) -> Option<ActiveTransport> {
        let active = self.active().take();
        if let Some(a) = &active {
            a.cancel.cancel();
        }
        active
    }

    fn writer(&self) -> Option<(u64, Arc<Mutex<FrameSink>>)> {
        self.active()
            .as_ref()
            .map(|a| (a.generation, a.sink.clone()))
    }

    /// Drops the transport of `generation` after a read or write failure.
    /// Returns `true` for the caller that actually tore it down.
    pub(crate) fn mark_lost(&self, generation: u64) -> bool {
        let lost = {
            let mut active = self.active();
            if active.as_ref().is_some_and(|a| a.generation == generation) {
                active.take()
            } else {
                None
            }
        };
        let Some(lost) = lost else {
            return false;
        };
        lost.cancel.cancel();
        self.state.send_if_modified(|s| {
            if *s == ConnectionState::Connected {
                *s = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        true
    }
}

/// One connect cycle, owned under the lifecycle lock.
struct Session {
    generation: u64,
    sink: Arc<Mutex<FrameSink>>,
    cancel: CancellationToken,
    reader: JoinHandle<ReaderExit>,
}

impl Session {
    async fn shutdown(self) {
        self.cancel.cancel();
        match self.reader.await {
            Ok(exit) => debug!(generation = self.generation, ?exit, "reader stopped"),
            Err(e) => warn!(generation = self.generation, error = %e, "reader task failed"),
        }
        let closed = time::timeout(CLOSE_GRACE, async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        })
        .await;
        match closed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "transport shutdown error"),
            Err(_) => debug!("transport shutdown timed out"),
        }
    }
}

/// Owns the stream to the daemon and its lifecycle.
pub struct Connection {
    endpoint: Endpoint,
    connect_timeout: Duration,
    max_frame_length: usize,
    link: Arc<Link>,
    pending: Arc<PendingCalls>,
    dispatcher: Arc<NotificationDispatcher>,
    session: Mutex<Option<Session>>,
}

impl Connection {
    pub fn new(
        endpoint: Endpoint,
        connect_timeout: Duration,
        max_frame_length: usize,
        pending: Arc<PendingCalls>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            endpoint,
            connect_timeout,
            max_frame_length,
            link: Arc::new(Link::new()),
            pending,
            dispatcher,
            session: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.link.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Opens the transport and starts the reader. A no-op when already
    /// connected; concurrent callers wait for the first attempt.
    pub async fn connect(&self) -> Result<(), IpcError> {
        let mut session = self.session.lock().await;
        match self.link.state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => return Err(IpcError::Closed),
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }

        // Reap the previous cycle; its reader has stopped or been cancelled.
        if let Some(old) = session.take() {
            old.shutdown().await;
        }

        self.link.set_state(ConnectionState::Connecting);
        info!(endpoint = %self.endpoint, "connecting to daemon");
        let io = match connect_endpoint(&self.endpoint, self.connect_timeout).await {
            Ok(io) => io,
            Err(e) => {
                self.link.set_state(ConnectionState::Disconnected);
                warn!(endpoint = %self.endpoint, error = %e, "failed to connect to daemon");
                return Err(e);
            }
        };

        let (sink, source) = framing::into_framed(io, self.max_frame_length).split();
        let sink = Arc::new(Mutex::new(sink));
        let cancel = CancellationToken::new();
        let generation = self.link.activate(sink.clone(), cancel.clone());

        let ctx = ReaderContext {
            generation,
            link: self.link.clone(),
            pending: Arc::downgrade(&self.pending),
            dispatcher: self.dispatcher.clone(),
        };
        let reader = tokio::spawn(reader::run(source, ctx, cancel.clone()));

        *session = Some(Session {
            generation,
            sink,
            cancel,
            reader,
        });
        info!(endpoint = %self.endpoint, generation, "connected to daemon");
        Ok(())
    }

    /// Writes one whole frame. Writers are serialized by the sink mutex, so
    /// frames from concurrent callers never interleave.
    pub async fn transmit(&self, call: Call) -> Result<(), IpcError> {
        let Some((generation, sink)) = self.link.writer() else {
            return Err(IpcError::ConnectionLost("no open transport".into()));
        };
        let sent = {
            let mut sink = sink.lock().await;
            sink.send(call).await
        };
        match sent {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                Err(IpcError::Protocol(e.to_string()))
            }
            Err(e) => {
                let reason = format!("write failed: {e}");
                if self.link.mark_lost(generation) {
                    let failed = self
                        .pending
                        .fail_all(&IpcError::ConnectionLost(reason.clone()));
                    warn!(generation, failed, error = %e, "daemon connection lost while writing");
                }
                Err(IpcError::ConnectionLost(reason))
            }
        }
    }

    /// Stops the reader, releases the transport and enters the terminal
    /// `Closed` state. Calls still pending are failed with `ConnectionLost`.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        if self.link.state() == ConnectionState::Closed {
            return;
        }
        self.link.set_state(ConnectionState::Closing);
        self.link.take_active();
        if let Some(s) = session.take() {
            s.shutdown().await;
        }
        self.link.set_state(ConnectionState::Closed);

        let failed = self
            .pending
            .fail_all(&IpcError::ConnectionLost("connection closed".into()));
        info!(endpoint = %self.endpoint, failed, "connection closed");
    }
}

async fn connect_endpoint(endpoint: &Endpoint, timeout: Duration) -> Result<BoxedStream, IpcError> {
    match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = time::timeout(timeout, net::UnixStream::connect(path))
                .await
                .map_err(|_| IpcError::ConnectTimeout(timeout))?
                .map_err(|e| IpcError::Connect(format!("{endpoint}: {e}")))?;
            Ok(Box::new(stream))
        }
        Endpoint::Tcp(addr) => {
            let stream = time::timeout(timeout, net::TcpStream::connect(addr))
                .await
                .map_err(|_| IpcError::ConnectTimeout(timeout))?
                .map_err(|e| IpcError::Connect(format!("{endpoint}: {e}")))?;
            // Frames are small and latency-sensitive.
            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "could not disable nagle");
            }
            Ok(Box::new(stream))
        }
    }
}
