use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duplicate::{DuplicateId, Partition};
use crate::lead::LeadId;

/// Operator actions on a duplicate item. Exactly one is applied per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Drop the item; no record is touched.
    Discard,
    /// Keep both: insert the import as a brand-new record.
    CreateNew,
    /// Merge the imported fields onto the matched record (conflicts only).
    Overwrite,
    /// Replace the matched record's primary contact (colleagues only).
    ReplaceContact,
    /// Fill the primary contact from non-blank imported fields (colleagues only).
    MergeContact,
    /// Append imported contacts not yet on the matched record (colleagues only).
    AddColleague,
}

impl ReconcileAction {
    /// Every action, in presentation order.
    pub const ALL: [Self; 6] = [
        Self::Discard,
        Self::CreateNew,
        Self::Overwrite,
        Self::ReplaceContact,
        Self::MergeContact,
        Self::AddColleague,
    ];

    /// Stable action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discard => "discard",
            Self::CreateNew => "create_new",
            Self::Overwrite => "overwrite",
            Self::ReplaceContact => "replace_contact",
            Self::MergeContact => "merge_contact",
            Self::AddColleague => "add_colleague",
        }
    }

    /// Whether the action belongs to the partition's action set.
    #[must_use]
    pub const fn is_offered_in(self, partition: Partition) -> bool {
        match self {
            Self::Discard | Self::CreateNew => true,
            Self::Overwrite => matches!(partition, Partition::Conflict),
            Self::ReplaceContact | Self::MergeContact | Self::AddColleague => {
                matches!(partition, Partition::Colleague)
            }
        }
    }

    /// Whether the action operates on a matched record.
    #[must_use]
    pub const fn requires_match(self) -> bool {
        !matches!(self, Self::Discard | Self::CreateNew)
    }

    /// Whether the action destroys existing data and needs explicit consent.
    #[must_use]
    pub const fn requires_confirmation(self) -> bool {
        matches!(self, Self::Overwrite | Self::ReplaceContact)
    }

    /// Actions available for an item in `partition`.
    ///
    /// Without a matched record only Discard and Create New remain.
    #[must_use]
    pub fn offered(partition: Partition, has_match: bool) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|a| a.is_offered_in(partition))
            .filter(|a| has_match || !a.requires_match())
            .collect()
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator consent for destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Confirmation {
    /// The operator explicitly approved the action.
    Confirmed,
    /// No approval was given.
    #[default]
    Unconfirmed,
}

/// Outcome of an action that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Records were written and the item was removed from the queue.
    Resolved {
        item_id: DuplicateId,
        action: ReconcileAction,
        /// The record created or updated, if any.
        lead_id: Option<LeadId>,
    },
    /// Nothing changed; the item stays queued.
    Rejected {
        item_id: DuplicateId,
        action: ReconcileAction,
        /// Message for the operator.
        notice: String,
    },
}

impl Resolution {
    /// Returns true when the item left the queue.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}
