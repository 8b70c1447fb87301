//! # leadrecon - Duplicate resolution for imported agency leads
//!
//! Bulk imports flag records that look like something already on file and
//! park them in a duplicate queue. leadrecon decides, per queued item, which
//! existing record it duplicates and applies the operator's chosen
//! reconciliation without breaking contact-list invariants.
//!
//! ## Core Concepts
//!
//! - **Lead**: a canonical existing record; agent-type leads carry an agency profile
//! - **DuplicateItem**: an imported record awaiting review, tagged with a reason
//! - **Partition**: conflicts (field clashes) versus potential colleagues (new contacts)
//! - **Match resolver**: pairs an item with zero or one existing record
//! - **Reconciler**: discard, create, overwrite, or update contacts, then dequeue
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use leadrecon::storage::{InMemoryDuplicateQueue, InMemoryLeadStore};
//! use leadrecon::{
//!     AgencyProfile, Confirmation, Contact, DuplicateItem, DuplicateQueue, DuplicateReason, Lead,
//!     LeadData, Partition, ReconConfig, ReconcileAction, ReviewDesk,
//! };
//!
//! let leads = Arc::new(InMemoryLeadStore::new());
//! leads.seed(Lead::new(
//!     "lead-1",
//!     LeadData::agent("Global Ed", AgencyProfile::new("Global Ed", Contact::new("Ana", "Ruiz").with_email("ana@globaled.com"))),
//! ))?;
//!
//! let queue = Arc::new(InMemoryDuplicateQueue::new());
//! let colleague = Contact::new("Ben", "Okoro").with_email("ben@globaled.com");
//! queue.enqueue(
//!     DuplicateItem::new(
//!         DuplicateReason::PotentialColleague,
//!         LeadData::agent("Global Ed", AgencyProfile::new("Global Ed", colleague)),
//!     )
//!     .with_id("dup-1"),
//! )?;
//!
//! let mut desk = ReviewDesk::open(leads, queue, ReconConfig::default())?;
//! desk.switch_partition(Partition::Colleague);
//! desk.select("dup-1");
//! let report = desk.resolve(ReconcileAction::AddColleague, Confirmation::Unconfirmed);
//! assert!(report.is_resolved());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Records and queue items
pub mod duplicate;
pub mod error;
pub mod lead;

// Matching and reconciliation
pub mod matcher;
pub mod merge;
pub mod reconcile;

// Review
pub mod desk;
pub mod session;

// Collaborators and ambient services
pub mod config;
pub mod storage;
pub mod telemetry;

// Re-export primary types at crate root for convenience
pub use config::ReconConfig;
pub use desk::{ActionReport, ReviewDesk};
pub use duplicate::{DuplicateId, DuplicateItem, DuplicateReason, Partition, POTENTIAL_COLLEAGUE};
pub use error::{ExecutionError, ReconError, ReconResult, ValidationError};
pub use lead::{AgencyProfile, Contact, ContactField, Lead, LeadData, LeadId, LeadType};
pub use matcher::{find_candidates, find_match, MatchCandidate, MatchReport, MatchRule, MatchSet};
pub use merge::{ContactMergePolicy, ContactMergeRules, LeadPatch, CONTACT_MERGE_POLICY, CONTACT_REPLACE_POLICY};
pub use reconcile::{Confirmation, ReconcileAction, Reconciler, Resolution};
pub use session::{ReviewSession, ReviewView, SessionEvent};
pub use storage::{DuplicateQueue, LeadStore, StorageError};
