use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duplicate::DuplicateItem;
use crate::error::{ExecutionError, ReconError, ReconResult};

/// Unique identifier for a queue subscription.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The entire queue contents at one point in time.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    /// Monotonic change counter of the queue that produced the snapshot.
    pub sequence: u64,
    /// Every queued item.
    pub items: Arc<Vec<DuplicateItem>>,
}

impl QueueSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(sequence: u64, items: Vec<DuplicateItem>) -> Self {
        Self {
            sequence,
            items: Arc::new(items),
        }
    }

    /// An empty snapshot with sequence 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }
}

/// A live subscription to the duplicate queue.
///
/// Dropping this stream unsubscribes. Each delivery is a full snapshot, so a
/// consumer that falls behind only needs the newest one ([`Self::try_latest`]).
#[derive(Debug)]
pub struct SnapshotStream {
    subscription_id: SubscriptionId,
    rx: Receiver<QueueSnapshot>,
    closed: Arc<AtomicBool>,
}

impl SnapshotStream {
    /// Creates a stream over `rx`; the producer stops delivering once
    /// `closed` is set.
    #[must_use]
    pub fn new(subscription_id: SubscriptionId, rx: Receiver<QueueSnapshot>, closed: Arc<AtomicBool>) -> Self {
        Self {
            subscription_id,
            rx,
            closed,
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Explicit unsubscription. Idempotent and non-blocking.
    pub fn unsubscribe(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns true once unsubscribed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Receive the next snapshot (blocking).
    pub fn recv(&self) -> ReconResult<QueueSnapshot> {
        self.rx.recv().map_err(|_| disconnected())
    }

    /// Receive the next snapshot with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> ReconResult<QueueSnapshot> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ReconError::Execution(ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Drain every buffered snapshot and return the newest, if any.
    pub fn try_latest(&self) -> ReconResult<Option<QueueSnapshot>> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => latest = Some(snapshot),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    return match latest {
                        Some(snapshot) => Ok(Some(snapshot)),
                        None => Err(disconnected()),
                    };
                }
            }
        }
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn disconnected() -> ReconError {
    ReconError::Execution(ExecutionError::Disconnected {
        path: "queue_snapshots".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn try_latest_returns_newest_buffered_snapshot() {
        let (tx, rx) = bounded(4);
        let stream = SnapshotStream::new(SubscriptionId::new(), rx, Arc::new(AtomicBool::new(false)));

        assert!(stream.try_latest().unwrap().is_none());

        tx.send(QueueSnapshot::new(1, Vec::new())).unwrap();
        tx.send(QueueSnapshot::new(2, Vec::new())).unwrap();
        assert_eq!(stream.try_latest().unwrap().unwrap().sequence, 2);
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let (_tx, rx) = bounded::<QueueSnapshot>(1);
        let stream = SnapshotStream::new(SubscriptionId::new(), rx, Arc::new(AtomicBool::new(false)));

        let err = stream.recv_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn drop_marks_subscription_closed() {
        let (_tx, rx) = bounded::<QueueSnapshot>(1);
        let closed = Arc::new(AtomicBool::new(false));
        let stream = SnapshotStream::new(SubscriptionId::new(), rx, Arc::clone(&closed));

        stream.unsubscribe();
        stream.unsubscribe();
        assert!(stream.is_closed());
        drop(stream);
        assert!(closed.load(Ordering::Acquire));
    }

    #[test]
    fn disconnected_without_snapshot_is_an_error() {
        let (tx, rx) = bounded::<QueueSnapshot>(1);
        let stream = SnapshotStream::new(SubscriptionId::new(), rx, Arc::new(AtomicBool::new(false)));
        drop(tx);
        assert!(stream.try_latest().is_err());
        assert!(stream.recv().is_err());
    }
}
