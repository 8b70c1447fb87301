//! In-memory storage backend.
//!
//! Thread-safe in-memory implementations of the storage traits. They are
//! intended for embedded usage, tests, and as a reference implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::config::ReconConfig;
use crate::duplicate::{DuplicateId, DuplicateItem};
use crate::error::{ReconResult, ValidationError};
use crate::lead::{Lead, LeadData, LeadId};
use crate::merge::LeadPatch;
use crate::storage::stream::{QueueSnapshot, SnapshotStream, SubscriptionId};
use crate::storage::traits::{DuplicateQueue, LeadStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct LeadState {
    // Insertion order is the iteration order seen by the resolver.
    records: Vec<Lead>,
    by_id: HashMap<LeadId, usize>,
}

impl LeadState {
    fn push(&mut self, lead: Lead) -> Result<(), StorageError> {
        if self.by_id.contains_key(&lead.id) {
            return Err(StorageError::DuplicateKey(lead.id.to_string()));
        }
        self.by_id.insert(lead.id.clone(), self.records.len());
        self.records.push(lead);
        Ok(())
    }
}

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    state: RwLock<LeadState>,
}

impl InMemoryLeadStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record that already has an id (fixtures, migrations).
    ///
    /// # Errors
    /// - `DuplicateKey`: if a record with the same id exists
    pub fn seed(&self, lead: Lead) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("lead.seed"))?;
        state.push(lead)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("lead.len"))?;
        Ok(state.records.len())
    }

    /// Returns true when no record is stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|n| n == 0)
    }
}

impl LeadStore for InMemoryLeadStore {
    fn list(&self) -> Result<Vec<Lead>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("lead.list"))?;
        Ok(state.records.clone())
    }

    fn get(&self, id: &LeadId) -> Result<Option<Lead>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("lead.get"))?;
        Ok(state.by_id.get(id).map(|&idx| state.records[idx].clone()))
    }

    fn insert(&self, data: LeadData) -> Result<LeadId, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("lead.insert"))?;
        let id = LeadId::generate();
        state.push(Lead::new(id.clone(), data))?;
        Ok(id)
    }

    fn update(&self, id: &LeadId, patch: LeadPatch) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("lead.update"))?;
        let Some(&idx) = state.by_id.get(id) else {
            return Err(StorageError::RecordNotFound(id.clone()));
        };
        patch.apply_to(&mut state.records[idx].data);
        Ok(())
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    tx: Sender<QueueSnapshot>,
    // Kept so a full buffer can shed its oldest snapshot.
    rx: Receiver<QueueSnapshot>,
    closed: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<DuplicateItem>,
    sequence: u64,
    subscribers: Vec<Subscriber>,
}

/// Thread-safe in-memory duplicate queue with live snapshot subscriptions.
#[derive(Debug)]
pub struct InMemoryDuplicateQueue {
    state: Mutex<QueueState>,
    snapshot_capacity: usize,
    shed_snapshots: AtomicU64,
}

impl Default for InMemoryDuplicateQueue {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

impl InMemoryDuplicateQueue {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue whose subscribers buffer up to `snapshot_capacity`
    /// undelivered snapshots.
    #[must_use]
    pub fn with_capacity(snapshot_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            snapshot_capacity: snapshot_capacity.max(1),
            shed_snapshots: AtomicU64::new(0),
        }
    }

    /// Create a queue sized by `config.snapshot_capacity`.
    ///
    /// # Errors
    /// - `InvalidConfig`: if `snapshot_capacity` is zero
    pub fn from_config(config: &ReconConfig) -> ReconResult<Self> {
        if config.snapshot_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "snapshot_capacity must be at least 1".to_string(),
            }
            .into());
        }
        Ok(Self::with_capacity(config.snapshot_capacity))
    }

    /// Number of stale snapshots discarded to make room for newer ones.
    #[must_use]
    pub fn shed_snapshots(&self) -> u64 {
        self.shed_snapshots.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> Result<usize, StorageError> {
        let mut state = self.state.lock().map_err(|_| lock_err("queue.subscriber_count"))?;
        state.subscribers.retain(|s| !s.closed.load(Ordering::Acquire));
        Ok(state.subscribers.len())
    }

    fn publish(&self, state: &mut QueueState) {
        state.sequence += 1;
        let snapshot = QueueSnapshot::new(state.sequence, state.items.clone());

        state.subscribers.retain(|s| !s.closed.load(Ordering::Acquire));
        for sub in &state.subscribers {
            match sub.tx.try_send(snapshot.clone()) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(pending)) => {
                    // Never block the writer: drop the oldest buffered snapshot instead.
                    if sub.rx.try_recv().is_ok() {
                        self.shed_snapshots.fetch_add(1, Ordering::Relaxed);
                    }
                    if sub.tx.try_send(pending).is_err() {
                        tracing::warn!(subscription = %sub.id, "queue snapshot dropped");
                    }
                }
            }
        }
    }
}

impl DuplicateQueue for InMemoryDuplicateQueue {
    fn snapshot(&self) -> Result<Vec<DuplicateItem>, StorageError> {
        let state = self.state.lock().map_err(|_| lock_err("queue.snapshot"))?;
        Ok(state.items.clone())
    }

    fn subscribe(&self) -> Result<SnapshotStream, StorageError> {
        let mut state = self.state.lock().map_err(|_| lock_err("queue.subscribe"))?;

        let id = SubscriptionId::new();
        let (tx, rx) = bounded::<QueueSnapshot>(self.snapshot_capacity);
        let closed = Arc::new(AtomicBool::new(false));

        tx.try_send(QueueSnapshot::new(state.sequence, state.items.clone()))
            .map_err(|e| StorageError::BackendError(format!("initial snapshot: {e}")))?;

        state.subscribers.push(Subscriber {
            id,
            tx,
            rx: rx.clone(),
            closed: Arc::clone(&closed),
        });
        Ok(SnapshotStream::new(id, rx, closed))
    }

    fn enqueue(&self, item: DuplicateItem) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| lock_err("queue.enqueue"))?;
        if state.items.iter().any(|queued| queued.id == item.id) {
            return Err(StorageError::DuplicateKey(item.id.to_string()));
        }
        state.items.push(item);
        self.publish(&mut state);
        Ok(())
    }

    fn delete(&self, id: &DuplicateId) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| lock_err("queue.delete"))?;
        let before = state.items.len();
        state.items.retain(|item| item.id != *id);
        if state.items.len() != before {
            self.publish(&mut state);
        }
        Ok(())
    }
}
