//! Typed event bus for cache updates.

use std::sync::Arc;

use tokio::sync::broadcast;

use adosync_types::{UpdateKind, UpdateParams};

use crate::error::SyncError;

/// What triggered the dispatch an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Periodic,
    Refresh,
    ClearCache,
}

/// How a dispatch ended.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Updated,
    Cancelled,
    Error(Arc<SyncError>),
}

/// One terminal event per dispatch, published in the order the manager
/// returns to idle.
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub source: UpdateSource,
    pub kind: UpdateKind,
    pub outcome: UpdateOutcome,
    /// The dispatched parameters; `None` for clear-cache notifications.
    pub params: Option<UpdateParams>,
}

/// Broadcast fan-out of [`CacheUpdate`]s. Subscribing returns a receiver;
/// dropping it is the unsubscribe.
#[derive(Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<CacheUpdate>,
}

impl UpdateBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.tx.subscribe()
    }

    pub fn publish(&self, update: CacheUpdate) {
        // No receivers is fine; the UI may not be listening yet.
        let _ = self.tx.send(update);
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}
