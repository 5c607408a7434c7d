use oplog::{Commit, ReconcileError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Replica not found: {0}")]
    UnknownReplica(String),

    #[error("Replica already exists: {0}")]
    DuplicateName(String),

    #[error("Replica {0} cannot sync from itself")]
    SelfSync(String),

    #[error("Replicas {replica} and {from} are both spokes and can only sync through the root")]
    SpokeSync { replica: String, from: String },

    #[error("Edit on {replica} failed: {source}")]
    Edit {
        replica: String,
        #[source]
        source: ReconcileError,
    },

    #[error("Sync of {replica} from {from} failed: {source}")]
    Sync {
        replica: String,
        from: String,
        #[source]
        source: SyncError,
        // The commit the session stopped at, when it was part of the batch
        commit: Option<Box<Commit<String>>>,
    },
}
