//! Error types for leadrecon.
//!
//! All errors are strongly typed using thiserror so callers can pattern match
//! on the specific condition that stopped a resolution.

use thiserror::Error;

use crate::duplicate::{DuplicateId, Partition};
use crate::lead::LeadId;
use crate::reconcile::ReconcileAction;
use crate::storage::StorageError;

/// Validation errors raised before any storage call is issued.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Duplicate reason cannot be empty")]
    EmptyDuplicateReason,

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Action '{action}' is not offered for {partition} items")]
    ActionNotOffered {
        action: ReconcileAction,
        partition: Partition,
    },

    #[error("Action '{action}' destroys existing data and must be confirmed")]
    ConfirmationRequired {
        action: ReconcileAction,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur while an action is being carried out.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No existing record matches duplicate {item_id}")]
    NoMatch {
        item_id: DuplicateId,
    },

    #[error("Matched record {id} disappeared before it could be updated")]
    RecordVanished {
        id: LeadId,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Subscription '{path}' disconnected")]
    Disconnected {
        path: String,
    },
}

/// Top-level error type for leadrecon.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ReconError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if the operator can expect a retry to succeed without
    /// changing anything on their side.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false, // Validation errors won't change on retry
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. } | ExecutionError::RecordVanished { .. }
            ),
            Self::Storage(e) => matches!(
                e,
                StorageError::BackendError(_)
                    | StorageError::ConnectionError(_)
                    | StorageError::Timeout { .. }
            ),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for leadrecon operations.
pub type ReconResult<T> = Result<T, ReconError>;
