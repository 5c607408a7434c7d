use crate::commit::{ReplicaId, Version};
use crate::operation::OperationKind;
use thiserror::Error;

/// Why a single remote commit could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The author claims to have seen local history that either does not
    /// exist yet or was stamped after its own operation
    #[error(
        "causality violation: author had seen version {checkpoint} but the causal cut-off is \
         {cutoff} (local log head {head})"
    )]
    CausalityViolation {
        checkpoint: Version,
        cutoff: Version,
        head: Version,
    },

    /// The corrected index does not address the list
    #[error("malformed {kind}: index {index} is out of range for a list of {len}")]
    MalformedOperation {
        kind: OperationKind,
        index: usize,
        len: usize,
    },
}

/// A sync session stopped before consuming every fetched commit
///
/// Everything before the offending commit stays applied and the session
/// checkpoint points right before it, so syncing again resumes there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("commit {version} from {remote} (authored by {author}) was rejected: {reason}")]
    Rejected {
        remote: ReplicaId,
        author: ReplicaId,
        version: Version,
        #[source]
        reason: ReconcileError,
    },

    #[error("commit {found} from {remote} does not follow version {expected_after}")]
    Gap {
        remote: ReplicaId,
        expected_after: Version,
        found: Version,
    },

    /// The edit already reached this replica through another peer. Only
    /// trees of replicas are supported, so the session stops here.
    #[error("commit {version} from {remote} repeats an edit by {author} applied earlier")]
    Duplicate {
        remote: ReplicaId,
        author: ReplicaId,
        version: Version,
    },
}

impl SyncError {
    pub fn remote(&self) -> ReplicaId {
        match self {
            SyncError::Rejected { remote, .. }
            | SyncError::Gap { remote, .. }
            | SyncError::Duplicate { remote, .. } => *remote,
        }
    }

    /// Version of the commit the session stopped at
    pub fn version(&self) -> Version {
        match self {
            SyncError::Rejected { version, .. } | SyncError::Duplicate { version, .. } => *version,
            SyncError::Gap { found, .. } => *found,
        }
    }
}

/// Failure of a sync driven through a [`crate::CommitSource`]
#[derive(Debug, Error)]
pub enum PullError<E> {
    #[error("transport failure: {0}")]
    Transport(E),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
