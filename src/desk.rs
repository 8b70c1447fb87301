//! Operator review desk.
//!
//! Ties the live queue subscription, the review session and the
//! reconciliation engine together for a single operator. The desk is driven
//! from one thread: snapshots are applied when [`ReviewDesk::pump`] or
//! [`ReviewDesk::wait_for_update`] is called, and every action runs to
//! completion before the next event is handled.
//!
//! Failures never escape [`ReviewDesk::resolve`]: they are logged and
//! reported, and the item stays queued so the operator can retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::ReconConfig;
use crate::duplicate::{DuplicateId, DuplicateItem, Partition};
use crate::error::{ExecutionError, ReconError, ReconResult};
use crate::matcher::MatchReport;
use crate::reconcile::{Confirmation, ReconcileAction, Reconciler, Resolution};
use crate::session::{ReviewSession, ReviewView, SessionEvent};
use crate::storage::{DuplicateQueue, LeadStore, QueueSnapshot, SnapshotStream};

/// What happened when the operator triggered an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReport {
    /// The engine reached a decision (resolved or rejected with a notice).
    Completed(Resolution),
    /// No item is selected.
    NothingSelected,
    /// The action failed; nothing was removed from the queue.
    Failed {
        item_id: DuplicateId,
        action: ReconcileAction,
        message: String,
        /// Whether retrying unchanged may succeed.
        retryable: bool,
    },
}

impl ActionReport {
    /// Returns true when the item left the queue.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed(resolution) if resolution.is_resolved())
    }
}

/// A single operator's view of the duplicate queue.
pub struct ReviewDesk {
    engine: Reconciler,
    stream: SnapshotStream,
    snapshot: QueueSnapshot,
    session: ReviewSession,
}

impl ReviewDesk {
    /// Subscribes to the queue and starts on the conflict partition.
    pub fn open(
        leads: Arc<dyn LeadStore>,
        queue: Arc<dyn DuplicateQueue>,
        config: ReconConfig,
    ) -> ReconResult<Self> {
        config.validate()?;
        let stream = queue.subscribe()?;
        let snapshot = stream.try_latest()?.unwrap_or_else(QueueSnapshot::empty);
        Ok(Self {
            engine: Reconciler::new(leads, queue, config),
            stream,
            snapshot,
            session: ReviewSession::new(),
        })
    }

    /// Applies the newest pending snapshot. Returns true if one arrived.
    pub fn pump(&mut self) -> ReconResult<bool> {
        match self.stream.try_latest()? {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Waits up to `timeout` for a snapshot, then applies the newest one.
    /// Returns false on timeout.
    pub fn wait_for_update(&mut self, timeout: Duration) -> ReconResult<bool> {
        match self.stream.recv_timeout(timeout) {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot);
                self.pump()?;
                Ok(true)
            }
            Err(ReconError::Execution(ExecutionError::Timeout { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn apply_snapshot(&mut self, snapshot: QueueSnapshot) {
        self.session = self.session.on_snapshot(&snapshot.items);
        self.snapshot = snapshot;
    }

    /// Every queued item in the latest snapshot.
    #[must_use]
    pub fn items(&self) -> &[DuplicateItem] {
        &self.snapshot.items
    }

    /// The current session state.
    #[must_use]
    pub fn session(&self) -> &ReviewSession {
        &self.session
    }

    /// What the operator currently sees.
    #[must_use]
    pub fn view(&self) -> ReviewView<'_> {
        self.session.view(&self.snapshot.items)
    }

    /// Shows `partition`, clearing the selection.
    pub fn switch_partition(&mut self, partition: Partition) {
        self.dispatch(SessionEvent::SwitchPartition(partition));
    }

    /// Selects an item of the active partition. Returns false if it is not
    /// queued there.
    pub fn select(&mut self, id: impl Into<DuplicateId>) -> bool {
        self.dispatch(SessionEvent::Select(id.into()));
        self.session.selected().is_some()
    }

    /// Clears the selection.
    pub fn clear_selection(&mut self) {
        self.dispatch(SessionEvent::ClearSelection);
    }

    fn dispatch(&mut self, event: SessionEvent) {
        self.session = self.session.apply(event, &self.snapshot.items);
    }

    /// The item under review.
    #[must_use]
    pub fn selected_item(&self) -> Option<&DuplicateItem> {
        self.session.selected_item(&self.snapshot.items)
    }

    /// The existing record the selected item matches, read fresh.
    pub fn current_match(&self) -> ReconResult<Option<MatchReport>> {
        match self.selected_item() {
            Some(item) => self.engine.find_match(item),
            None => Ok(None),
        }
    }

    /// Actions the operator may pick for the selected item.
    pub fn available_actions(&self) -> ReconResult<Vec<ReconcileAction>> {
        let Some(item) = self.selected_item() else {
            return Ok(Vec::new());
        };
        let has_match = self.engine.find_match(item)?.is_some();
        Ok(ReconcileAction::offered(item.partition(), has_match))
    }

    /// Runs `action` on the selected item.
    pub fn resolve(&mut self, action: ReconcileAction, confirmation: Confirmation) -> ActionReport {
        let Some(item) = self.selected_item().cloned() else {
            return ActionReport::NothingSelected;
        };

        match self.engine.execute(&item, action, confirmation) {
            Ok(resolution) => ActionReport::Completed(resolution),
            Err(err) => {
                if err.is_validation() {
                    warn!(item_id = %item.id, action = %action, error = %err, "action refused");
                } else {
                    error!(item_id = %item.id, action = %action, error = %err, "action failed; item left queued");
                }
                ActionReport::Failed {
                    item_id: item.id,
                    action,
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate::DuplicateReason;
    use crate::lead::{AgencyProfile, Contact, Lead, LeadData};
    use crate::storage::{InMemoryDuplicateQueue, InMemoryLeadStore};

    fn data(name: &str, email: &str) -> LeadData {
        LeadData::agent(name, AgencyProfile::new(name, Contact::default().with_email(email)))
    }

    #[test]
    fn open_picks_up_existing_queue() {
        let leads = Arc::new(InMemoryLeadStore::new());
        let queue = Arc::new(InMemoryDuplicateQueue::new());
        queue
            .enqueue(DuplicateItem::new(DuplicateReason::EmailExists, data("Acme", "a@x.com")).with_id("dup-1"))
            .unwrap();

        let desk = ReviewDesk::open(leads, queue, ReconConfig::default()).unwrap();
        assert_eq!(desk.items().len(), 1);
        assert!(desk.selected_item().is_none());
    }

    #[test]
    fn resolve_without_selection_reports_nothing_selected() {
        let desk_leads = Arc::new(InMemoryLeadStore::new());
        let queue = Arc::new(InMemoryDuplicateQueue::new());
        let mut desk = ReviewDesk::open(desk_leads, queue, ReconConfig::default()).unwrap();

        let report = desk.resolve(ReconcileAction::Discard, Confirmation::Unconfirmed);
        assert_eq!(report, ActionReport::NothingSelected);
        assert!(desk.available_actions().unwrap().is_empty());
    }

    #[test]
    fn unconfirmed_overwrite_reports_failure_and_keeps_item() {
        let leads = Arc::new(InMemoryLeadStore::new());
        leads.seed(Lead::new("lead-1", data("Acme", "a@x.com"))).unwrap();
        let queue = Arc::new(InMemoryDuplicateQueue::new());
        queue
            .enqueue(DuplicateItem::new(DuplicateReason::EmailExists, data("Acme", "a@x.com")).with_id("dup-1"))
            .unwrap();

        let mut desk = ReviewDesk::open(leads, queue, ReconConfig::default()).unwrap();
        assert!(desk.select("dup-1"));
        assert_eq!(
            desk.available_actions().unwrap(),
            vec![ReconcileAction::Discard, ReconcileAction::CreateNew, ReconcileAction::Overwrite]
        );

        let report = desk.resolve(ReconcileAction::Overwrite, Confirmation::Unconfirmed);
        assert!(matches!(report, ActionReport::Failed { retryable: false, .. }));
        assert!(!desk.pump().unwrap());
        assert_eq!(desk.items().len(), 1);
    }

    #[test]
    fn blank_overwrite_marker_is_rejected_on_open() {
        let config = ReconConfig {
            overwrite_source: "  ".to_string(),
            ..ReconConfig::default()
        };
        let result = ReviewDesk::open(
            Arc::new(InMemoryLeadStore::new()),
            Arc::new(InMemoryDuplicateQueue::new()),
            config,
        );
        assert!(matches!(result, Err(ReconError::Validation(_))));
    }
}
