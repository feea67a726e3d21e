//! Reconciliation of desired config against remote state.

mod error;
mod operation;
mod options;
mod orchestrator;
mod reconcile;

pub use error::{MutationAction, MutationFailure, SyncError};
pub use operation::{sort_operations, ElementType, SyncOperation, SyncSummary};
pub use options::{Category, DriftPolicy, SyncOptions};
pub use orchestrator::{push_from_root, sync_push, Orchestrator};
pub use reconcile::{reconcile, CategoryOutcome, ElementStore, SyncMode};
