// WebSocket message types for client-hub communication

use chrono::{DateTime, Utc};
use oplog::{Commit, ReplicaId, SyncReport, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Summary of one hosted replica
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub name: String,
    pub id: ReplicaId,
    pub len: usize,
    pub head: Version,
    pub created_at: DateTime<Utc>,
    // Spokes only sync with the root
    pub root: bool,
}

// Messages sent from client to hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    // Host a new, empty replica under `name`
    CreateReplica { name: String },

    // Local insert on a hosted replica
    Insert {
        replica: String,
        index: usize,
        value: String,
    },

    // Local replace on a hosted replica
    Set {
        replica: String,
        index: usize,
        value: String,
    },

    // Request the current list
    Read { replica: String },

    // Request the commits after `since` (the CommitSource seam)
    Fetch { replica: String, since: Version },

    // `replica` pulls everything new from `from`
    Sync { replica: String, from: String },

    ListReplicas,

    // Heartbeat/ping
    Ping,
}

// Messages sent from hub to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    // First frame on every connection
    Welcome {
        connection_id: Uuid,
        replicas: Vec<ReplicaInfo>,
    },

    ReplicaCreated { replica: ReplicaInfo },

    // A local edit was appended
    Committed {
        replica: String,
        commit: Commit<String>,
    },

    Contents {
        replica: String,
        items: Vec<String>,
        head: Version,
    },

    Commits {
        replica: String,
        commits: Vec<Commit<String>>,
    },

    Synced {
        replica: String,
        from: String,
        report: SyncReport,
    },

    // Sync stopped at `version` of `from`'s log. Everything before it stays
    // applied.
    SyncFailed {
        replica: String,
        from: String,
        version: Version,
        reason: String,
        commit: Option<Commit<String>>,
    },

    Replicas { replicas: Vec<ReplicaInfo> },

    // Error message
    Error { message: String },

    // Pong response to ping
    Pong,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
