// A replica hosted by the hub

use crate::hub::ROOT;
use chrono::{DateTime, Utc};
use oplog::{Replica, ReplicaId, SharedClock};
use protocol::ReplicaInfo;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedReplica = Arc<RwLock<HostedReplica>>;

#[derive(Debug)]
pub struct HostedReplica {
    pub name: String,
    pub replica: Replica<String>,
    pub created_at: DateTime<Utc>,
}

impl HostedReplica {
    pub fn new(name: String, id: ReplicaId, clock: SharedClock) -> Self {
        HostedReplica {
            name,
            replica: Replica::new(id, clock),
            created_at: Utc::now(),
        }
    }

    pub fn info(&self) -> ReplicaInfo {
        ReplicaInfo {
            name: self.name.clone(),
            id: self.replica.id(),
            len: self.replica.len(),
            head: self.replica.log().head(),
            created_at: self.created_at,
            root: self.replica.id() == ROOT,
        }
    }
}
