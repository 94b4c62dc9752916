//! Bookkeeping for requests awaiting their response.
//!
//! Every operation that settles a call removes its entry and completes the
//! one-shot handle under the same lock, so each call is settled exactly once
//! no matter whether the reader, the timeout path or a disconnect gets there
//! first.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::{sync::oneshot, time::Instant};
use tracing::debug;

use super::error::{IpcError, Outcome};

struct PendingEntry {
    tx: oneshot::Sender<Outcome>,
    created_at: Instant,
    deadline: Instant,
}

#[derive(Default)]
pub struct PendingCalls {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        // No code path panics while holding the lock, but a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(
        &self,
        id: &str,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Outcome>, IpcError> {
        let mut entries = self.entries();
        if entries.contains_key(id) {
            return Err(IpcError::DuplicateIdentifier(id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(
            id.to_string(),
            PendingEntry {
                tx,
                created_at: Instant::now(),
                deadline,
            },
        );
        Ok(rx)
    }

    /// Completes the call if it is still pending. Returns `false` when it was
    /// already settled or never existed.
    pub fn resolve(&self, id: &str, outcome: Outcome) -> bool {
        let Some(entry) = self.entries().remove(id) else {
            return false;
        };
        if entry.tx.send(outcome).is_err() {
            debug!(id, "caller went away before its response arrived");
        }
        true
    }

    /// Timeout path. Returns `false` when a response already won the race.
    pub fn expire(&self, id: &str) -> bool {
        let Some(entry) = self.entries().remove(id) else {
            return false;
        };
        let waited = entry.deadline.saturating_duration_since(entry.created_at);
        let _ = entry.tx.send(Err(IpcError::Timeout(waited)));
        true
    }

    /// Drops the entry without settling it, for callers that stopped waiting.
    pub fn forget(&self, id: &str) -> bool {
        self.entries().remove(id).is_some()
    }

    /// Settles every pending call with `err`. Returns how many were pending.
    pub fn fail_all(&self, err: &IpcError) -> usize {
        let drained: Vec<_> = self.entries().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            if entry.tx.send(Err(err.clone())).is_err() {
                debug!(id = %id, "caller went away before disconnect was reported");
            }
        }
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
