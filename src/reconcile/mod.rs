//! Reconciliation engine.
//!
//! Turns an operator decision about one duplicate item into record writes
//! followed by removal of the item from the queue.

mod action;
mod engine;

pub use action::{Confirmation, ReconcileAction, Resolution};
pub use engine::Reconciler;
