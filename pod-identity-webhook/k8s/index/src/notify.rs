use ahash::AHashMap as HashMap;
use parking_lot::Mutex;
use pod_identity_webhook_core::{notifier, CacheKey, Notifier, Request, Signal};
use std::collections::hash_map::Entry;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Pending subscriptions for ServiceAccounts that have not been observed yet.
///
/// At most one signal exists per key. It is removed when it fires, so a later subscription for the
/// same key starts a new window (and a new refresh request).
#[derive(Debug)]
pub(crate) struct Notifications {
    pending: Mutex<HashMap<CacheKey, Signal>>,
    refresh_tx: Option<mpsc::Sender<Request>>,
}

// === impl Notifications ===

impl Notifications {
    pub(crate) fn new(refresh_tx: Option<mpsc::Sender<Request>>) -> Self {
        Self {
            pending: Default::default(),
            refresh_tx,
        }
    }

    pub(crate) fn subscribe(&self, req: &Request) -> Notifier {
        let mut pending = self.pending.lock();
        match pending.entry(req.key()) {
            Entry::Occupied(entry) => {
                trace!(key = %entry.key(), "Joining pending notification");
                entry.get().notifier()
            }
            Entry::Vacant(entry) => {
                debug!(key = %entry.key(), "Waiting for service account");
                let (signal, notifier) = notifier::channel();
                entry.insert(signal);
                self.request_refresh(req);
                notifier
            }
        }
    }

    /// Fires and forgets the pending signal for `key`, if any.
    pub(crate) fn release(&self, key: &CacheKey) -> bool {
        match self.pending.lock().remove(key) {
            Some(signal) => {
                debug!(%key, "Releasing waiters");
                signal.fire();
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    fn request_refresh(&self, req: &Request) {
        let Some(tx) = self.refresh_tx.as_ref() else {
            return;
        };

        let req = Request {
            request_notification: false,
            ..req.clone()
        };
        match tx.try_send(req) {
            Ok(()) => {}
            Err(TrySendError::Full(req)) => {
                warn!(key = %req.key(), "Refresh queue is full; dropping request");
            }
            Err(TrySendError::Closed(req)) => {
                debug!(key = %req.key(), "Refresh queue is closed");
            }
        }
    }
}
