//! Review session state.
//!
//! A pure reducer over (latest queue snapshot, operator event). It holds the
//! active partition and at most one selected item, and never caches queue
//! contents: every view is derived from the snapshot passed in.

use crate::duplicate::{DuplicateId, DuplicateItem, Partition};

/// Operator input to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Show the other partition. Always clears the selection.
    SwitchPartition(Partition),
    /// Select an item of the active partition.
    Select(DuplicateId),
    /// Return to "no item selected".
    ClearSelection,
}

/// Which partition is shown and which item is under review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSession {
    partition: Partition,
    selected: Option<DuplicateId>,
}

impl ReviewSession {
    /// A session on the conflict partition with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active partition.
    #[must_use]
    pub const fn partition(&self) -> Partition {
        self.partition
    }

    /// The selected item id, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&DuplicateId> {
        self.selected.as_ref()
    }

    /// Applies an operator event against the current snapshot.
    ///
    /// Selecting an id that is not queued in the active partition leaves the
    /// session with nothing selected.
    #[must_use]
    pub fn apply(&self, event: SessionEvent, items: &[DuplicateItem]) -> Self {
        match event {
            SessionEvent::SwitchPartition(partition) => Self {
                partition,
                selected: None,
            },
            SessionEvent::Select(id) => {
                let present = items
                    .iter()
                    .any(|item| item.id == id && item.partition() == self.partition);
                Self {
                    partition: self.partition,
                    selected: present.then_some(id),
                }
            }
            SessionEvent::ClearSelection => Self {
                partition: self.partition,
                selected: None,
            },
        }
    }

    /// Re-evaluates the session after a new snapshot arrived.
    ///
    /// A selected item that left the queue falls back to no selection; no
    /// replacement is picked.
    #[must_use]
    pub fn on_snapshot(&self, items: &[DuplicateItem]) -> Self {
        let still_queued = self
            .selected
            .as_ref()
            .is_some_and(|id| items.iter().any(|item| item.id == *id));
        Self {
            partition: self.partition,
            selected: if still_queued { self.selected.clone() } else { None },
        }
    }

    /// The selected item as found in `items`.
    #[must_use]
    pub fn selected_item<'a>(&self, items: &'a [DuplicateItem]) -> Option<&'a DuplicateItem> {
        let id = self.selected.as_ref()?;
        items.iter().find(|item| item.id == *id)
    }

    /// Derives what the operator sees.
    #[must_use]
    pub fn view<'a>(&self, items: &'a [DuplicateItem]) -> ReviewView<'a> {
        let mut listed: Vec<&DuplicateItem> = items
            .iter()
            .filter(|item| item.partition() == self.partition)
            .collect();
        listed.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));

        let colleague_count = items
            .iter()
            .filter(|item| item.partition() == Partition::Colleague)
            .count();

        ReviewView {
            partition: self.partition,
            items: listed,
            selected: self.selected_item(items),
            conflict_count: items.len() - colleague_count,
            colleague_count,
        }
    }
}

/// Read-only projection of a session over one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewView<'a> {
    /// The active partition.
    pub partition: Partition,
    /// Items of the active partition, newest import first.
    pub items: Vec<&'a DuplicateItem>,
    /// The item under review.
    pub selected: Option<&'a DuplicateItem>,
    /// Items queued as conflicts.
    pub conflict_count: usize,
    /// Items queued as potential colleagues.
    pub colleague_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate::DuplicateReason;
    use crate::lead::LeadData;
    use chrono::{Duration, Utc};

    fn item(id: &str, reason: DuplicateReason, minutes_ago: i64) -> DuplicateItem {
        DuplicateItem::new(reason, LeadData::default())
            .with_id(id)
            .imported_at(Utc::now() - Duration::minutes(minutes_ago))
    }

    fn snapshot() -> Vec<DuplicateItem> {
        vec![
            item("c-old", DuplicateReason::EmailExists, 30),
            item("c-new", DuplicateReason::WebsiteExists, 1),
            item("p-1", DuplicateReason::PotentialColleague, 5),
        ]
    }

    #[test]
    fn switching_partition_clears_selection() {
        let items = snapshot();
        let session = ReviewSession::new().apply(SessionEvent::Select("c-old".into()), &items);
        assert_eq!(session.selected().map(DuplicateId::as_str), Some("c-old"));

        let session = session.apply(SessionEvent::SwitchPartition(Partition::Colleague), &items);
        assert_eq!(session.partition(), Partition::Colleague);
        assert!(session.selected().is_none());
    }

    #[test]
    fn selecting_outside_active_partition_selects_nothing() {
        let items = snapshot();
        let session = ReviewSession::new().apply(SessionEvent::Select("p-1".into()), &items);
        assert!(session.selected().is_none());

        let session = session.apply(SessionEvent::Select("missing".into()), &items);
        assert!(session.selected().is_none());
    }

    #[test]
    fn vanished_selection_falls_back_to_none() {
        let items = snapshot();
        let session = ReviewSession::new().apply(SessionEvent::Select("c-new".into()), &items);

        let unchanged = session.on_snapshot(&items);
        assert_eq!(unchanged, session);

        let remaining: Vec<_> = items.into_iter().filter(|i| i.id.as_str() != "c-new").collect();
        let session = session.on_snapshot(&remaining);
        assert!(session.selected().is_none());
        assert_eq!(session.partition(), Partition::Conflict);
    }

    #[test]
    fn view_lists_active_partition_newest_first() {
        let items = snapshot();
        let session = ReviewSession::new().apply(SessionEvent::Select("c-old".into()), &items);
        let view = session.view(&items);

        let ids: Vec<&str> = view.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c-new", "c-old"]);
        assert_eq!(view.selected.map(|i| i.id.as_str()), Some("c-old"));
        assert_eq!(view.conflict_count, 2);
        assert_eq!(view.colleague_count, 1);
    }
}
