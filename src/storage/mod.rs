//! Storage contracts and in-memory reference backends.
//!
//! The record store and the duplicate queue are external collaborators; the
//! traits here are the surface the engine consumes. The in-memory backends
//! are intended for embedded use and tests.

mod memory;
mod stream;
mod traits;

pub use memory::{InMemoryDuplicateQueue, InMemoryLeadStore};
pub use stream::{QueueSnapshot, SnapshotStream, SubscriptionId};
pub use traits::{DuplicateQueue, LeadStore, StorageError};
