// Reconciliation core for a peer-replicated ordered list
// Concurrent Insert/Set edits are merged by translating each remote index
// through the local history its author had not seen

pub mod clock;
pub mod commit;
pub mod error;
pub mod log;
pub mod operation;
pub mod reconcile;
pub mod replica;
pub mod transform;

pub use {
    clock::{Clock, SharedClock},
    commit::{Checkpoint, Commit, LogicalTime, Provenance, ReplicaId, Stamp, Version},
    error::{PullError, ReconcileError, SyncError},
    log::CommitLog,
    operation::{Operation, OperationKind},
    reconcile::{reconcile, resolve, Outcome, Resolution},
    replica::{CommitSource, Replica, SyncReport},
    transform::{Side, Threshold, TransformIndexMap},
};
