//! Routing of unsolicited daemon messages.

use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock},
};

use ableton_proto::Notification;
use tokio::sync::broadcast;
use tracing::{info, warn};

const EVENT_CAPACITY: usize = 1024;

pub trait NotificationHandler: Send + Sync + 'static {
    fn handle(&self, notification: &Notification) -> anyhow::Result<()>;
}

impl<F> NotificationHandler for F
where
    F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, notification: &Notification) -> anyhow::Result<()> {
        self(notification)
    }
}

/// Routes notifications to handlers registered for their exact topic and
/// republishes every notification on a broadcast channel. Topics without a
/// handler are logged.
pub struct NotificationDispatcher {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn NotificationHandler>>>>,
    events_tx: broadcast::Sender<Notification>,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        let (events_tx, _events_rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            handlers: RwLock::new(HashMap::new()),
            events_tx,
        }
    }
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: NotificationHandler>(&self, topic: impl Into<String>, handler: H) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.into())
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events_tx.subscribe()
    }

    /// Returns the number of handlers that ran successfully.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        // No subscribers is the common case.
        let _ = self.events_tx.send(notification.clone());

        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&notification.topic)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            info!(topic = %notification.topic, args = ?notification.args, "daemon notification");
            return 0;
        }

        handlers
            .iter()
            .filter(|handler| {
                // Handlers run on the reader task; a panic must not take it down.
                match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(notification))) {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!(topic = %notification.topic, error = %e, "notification handler failed");
                        false
                    }
                    Err(payload) => {
                        warn!(
                            topic = %notification.topic,
                            panic = panic_message(payload.as_ref()),
                            "notification handler panicked"
                        );
                        false
                    }
                }
            })
            .count()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
