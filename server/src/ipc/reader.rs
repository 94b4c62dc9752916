use std::{
    io,
    sync::{Arc, Weak},
};

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    codec::{InboundFrame, Response},
    connection::Link,
    dispatch::NotificationDispatcher,
    error::IpcError,
    registry::PendingCalls,
};

pub(crate) struct ReaderContext {
    pub generation: u64,
    pub link: Arc<Link>,
    // The registry is owned by the client; the reader only borrows it per frame.
    pub pending: Weak<PendingCalls>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReaderExit {
    Cancelled,
    EndOfStream,
    Transport(String),
    RegistryGone,
}

impl ReaderExit {
    fn lost_reason(&self) -> Option<String> {
        match self {
            Self::Cancelled | Self::RegistryGone => None,
            Self::EndOfStream => Some("daemon closed the connection".into()),
            Self::Transport(e) => Some(format!("read failed: {e}")),
        }
    }
}

/// Reads frames until the stream ends, fails, or `cancel` fires.
///
/// On an end-of-stream or transport failure the link drops back to
/// `Disconnected` and every call still pending gets `ConnectionLost`.
pub(crate) async fn run<S>(frames: S, ctx: ReaderContext, cancel: CancellationToken) -> ReaderExit
where
    S: Stream<Item = io::Result<InboundFrame>> + Unpin,
{
    debug!(generation = ctx.generation, "reader started");
    let unwind = UnwindGuard { ctx: &ctx };
    let exit = read_loop(frames, &ctx, &cancel).await;
    std::mem::forget(unwind);

    if let Some(reason) = exit.lost_reason() {
        release(&ctx, &reason);
    }
    debug!(generation = ctx.generation, ?exit, "reader stopped");
    exit
}

fn release(ctx: &ReaderContext, reason: &str) {
    if !ctx.link.mark_lost(ctx.generation) {
        return;
    }
    let failed = ctx
        .pending
        .upgrade()
        .map(|pending| pending.fail_all(&IpcError::ConnectionLost(reason.to_string())))
        .unwrap_or(0);
    warn!(generation = ctx.generation, failed, reason = %reason, "daemon connection lost");
}

// Drops the link if the read loop unwinds or its task is dropped mid-read.
struct UnwindGuard<'a> {
    ctx: &'a ReaderContext,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        release(self.ctx, "reader task panicked");
    }
}

async fn read_loop<S>(mut frames: S, ctx: &ReaderContext, cancel: &CancellationToken) -> ReaderExit
where
    S: Stream<Item = io::Result<InboundFrame>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReaderExit::Cancelled,
            next = frames.next() => next,
        };
        let frame = match next {
            None => return ReaderExit::EndOfStream,
            Some(Err(e)) => return ReaderExit::Transport(e.to_string()),
            Some(Ok(frame)) => frame,
        };

        match frame {
            InboundFrame::Response(Response { id, outcome }) => {
                let Some(pending) = ctx.pending.upgrade() else {
                    return ReaderExit::RegistryGone;
                };
                if !pending.resolve(&id, outcome.map_err(IpcError::from)) {
                    debug!(id = %id, "dropping response for unknown or settled call");
                }
            }
            InboundFrame::Notification(notification) => {
                ctx.dispatcher.dispatch(&notification);
            }
            InboundFrame::Malformed { raw, reason } => {
                warn!(
                    reason = %reason,
                    len = raw.len(),
                    frame = %String::from_utf8_lossy(&raw[..raw.len().min(256)]),
                    "ignoring malformed frame from daemon"
                );
            }
        }
    }
}
