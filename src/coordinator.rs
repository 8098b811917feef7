//! Coordinator / Subscription Bus (§4.4): a process-wide registry of active
//! Requests keyed by id, broadcasting snapshots to subscribers on every
//! state change and dispatching retries.
//!
//! Subscription is `tokio::sync::broadcast` per Request plus one crate-wide
//! channel for a global feed. The bounded, lagging-receiver-drops-oldest
//! behaviour of `broadcast` is exactly the "best-effort, oldest-dropped"
//! delivery policy the design calls acceptable (§4.4, §5).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Request, RequestStatus, StepType};
use crate::pipeline::{Engine, SnapshotSink};

const PER_REQUEST_CHANNEL_CAPACITY: usize = 64;
const GLOBAL_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("request already registered: {0}")]
    AlreadyRegistered(Uuid),
    #[error("request not found: {0}")]
    NotFound(Uuid),
}

struct Entry {
    request: Request,
    tx: broadcast::Sender<Request>,
}

pub struct Coordinator {
    engine: Engine,
    entries: RwLock<HashMap<Uuid, Entry>>,
    global_tx: broadcast::Sender<Request>,
}

/// Feeds `Engine::run`/`retry_*` snapshots back into the Coordinator's
/// registry and subscriber channels. Never blocks or errors the pipeline;
/// a `send` with no receivers (or a lagging one) is simply ignored.
struct BroadcastSink<'a> {
    coordinator: &'a Coordinator,
}

impl SnapshotSink for BroadcastSink<'_> {
    fn on_update(&mut self, request: &Request) {
        self.coordinator.store_and_broadcast(request);
    }
}

impl Coordinator {
    pub fn new(engine: Engine) -> Arc<Self> {
        let (global_tx, _rx) = broadcast::channel(GLOBAL_CHANNEL_CAPACITY);
        Arc::new(Coordinator {
            engine,
            entries: RwLock::new(HashMap::new()),
            global_tx,
        })
    }

    /// Stores a freshly-created Request. Fails if `id` is already present.
    pub fn register(&self, request: Request) -> Result<(), CoordinatorError> {
        let mut entries = self.entries.write().expect("coordinator lock poisoned");
        if entries.contains_key(&request.id) {
            return Err(CoordinatorError::AlreadyRegistered(request.id));
        }
        let (tx, _rx) = broadcast::channel(PER_REQUEST_CHANNEL_CAPACITY);
        let _ = self.global_tx.send(request.clone());
        entries.insert(request.id, Entry { request, tx });
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Request> {
        self.entries
            .read()
            .expect("coordinator lock poisoned")
            .get(&id)
            .map(|entry| entry.request.clone())
    }

    /// Receives a Request snapshot on every `broadcast_update` for `id`.
    pub fn subscribe(&self, id: Uuid) -> Option<broadcast::Receiver<Request>> {
        self.entries
            .read()
            .expect("coordinator lock poisoned")
            .get(&id)
            .map(|entry| entry.tx.subscribe())
    }

    /// Cross-request feed, e.g. for an index page watching every active Request.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Request> {
        self.global_tx.subscribe()
    }

    /// Replaces the stored snapshot iff `request.updated_at` is not older
    /// than what's already stored, then fans it out to this Request's
    /// subscribers and the global feed.
    fn store_and_broadcast(&self, request: &Request) {
        {
            let mut entries = self.entries.write().expect("coordinator lock poisoned");
            if let Some(entry) = entries.get_mut(&request.id) {
                if request.updated_at >= entry.request.updated_at {
                    entry.request = request.clone();
                }
                let _ = entry.tx.send(entry.request.clone());
            }
        }
        let _ = self.global_tx.send(request.clone());
    }

    /// Runs a freshly-registered Request to completion in the background.
    pub fn start(self: &Arc<Self>, id: Uuid) -> Result<(), CoordinatorError> {
        if self.get(id).is_none() {
            return Err(CoordinatorError::NotFound(id));
        }
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let Some(mut request) = coordinator.get(id) else {
                return;
            };
            let mut sink = BroadcastSink {
                coordinator: &coordinator,
            };
            coordinator.engine.run(&mut request, &mut sink).await;
        });
        Ok(())
    }

    /// `retry(id, step_type?)` (§4.4): `Some(step_type)` re-runs that step
    /// and everything after it; `None` re-runs the whole Request.
    pub fn retry(self: &Arc<Self>, id: Uuid, step_type: Option<StepType>) -> Result<(), CoordinatorError> {
        if self.get(id).is_none() {
            return Err(CoordinatorError::NotFound(id));
        }
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let Some(mut request) = coordinator.get(id) else {
                return;
            };
            let mut sink = BroadcastSink {
                coordinator: &coordinator,
            };
            match step_type {
                Some(step) => coordinator.engine.retry_step(&mut request, step, &mut sink).await,
                None => coordinator.engine.retry_all(&mut request, &mut sink).await,
            }
        });
        Ok(())
    }

    /// Drops terminal Requests older than `retention` (§3, "retention window
    /// (caller-defined)"). Never runs on its own timer; a caller drives it,
    /// keeping the crate free of implicit background reapers.
    pub fn sweep(&self, now: DateTime<Utc>, retention: Duration) {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
        let mut entries = self.entries.write().expect("coordinator lock poisoned");
        entries.retain(|_, entry| {
            let terminal = matches!(
                entry.request.status,
                RequestStatus::Completed | RequestStatus::Failed
            );
            !(terminal && now - entry.request.updated_at > retention)
        });
    }
}
