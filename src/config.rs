//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReconResult, ValidationError};

/// Configuration for reconciliation and review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Source marker stamped on records rewritten by Overwrite.
    pub overwrite_source: String,
    /// Undelivered queue snapshots buffered per subscriber.
    pub snapshot_capacity: usize,
    /// Log and expose further candidates when several records match.
    pub surface_ambiguous_matches: bool,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            overwrite_source: "Duplicate Overwrite".to_string(),
            snapshot_capacity: 16,
            surface_ambiguous_matches: true,
            log_filter: "info".to_string(),
        }
    }
}

impl ReconConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> ReconResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ReconResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks the settings the engine and desk consume.
    ///
    /// `snapshot_capacity` belongs to the queue backend and is checked by
    /// [`InMemoryDuplicateQueue::from_config`](crate::storage::InMemoryDuplicateQueue::from_config).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.overwrite_source.trim().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "overwrite_source cannot be blank".to_string(),
            });
        }
        Ok(())
    }
}
