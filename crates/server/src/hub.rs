// Named replicas hosted in one process

use crate::error::HubError;
use crate::replica::{HostedReplica, SharedReplica};
use oplog::{Commit, ReplicaId, SharedClock, SyncReport, Version};
use protocol::ReplicaInfo;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The first replica created. Every sync session has it on one side.
pub const ROOT: ReplicaId = ReplicaId(1);

/// Hub state shared across connections
///
/// Every hosted replica draws logical times from the same clock. Each
/// replica sits behind its own lock, so edits and sync sessions on one
/// replica are serialized while different replicas proceed in parallel.
/// Replicas form a star around [`ROOT`]: two spokes never sync directly.
#[derive(Clone, Default)]
pub struct HubState {
    replicas: Arc<RwLock<HashMap<String, SharedReplica>>>,
    clock: SharedClock,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_replica(&self, name: String) -> Result<ReplicaInfo, HubError> {
        let mut replicas = self.replicas.write().await;
        if replicas.contains_key(&name) {
            return Err(HubError::DuplicateName(name));
        }

        // ids are never reused since replicas are never removed
        let id = ReplicaId(replicas.len() as u32 + 1);
        let hosted = HostedReplica::new(name.clone(), id, self.clock.clone());
        let info = hosted.info();
        replicas.insert(name, Arc::new(RwLock::new(hosted)));

        tracing::info!("Created replica {} as {}", info.name, id);
        Ok(info)
    }

    async fn get(&self, name: &str) -> Result<SharedReplica, HubError> {
        self.replicas
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| HubError::UnknownReplica(name.to_string()))
    }

    pub async fn insert(
        &self,
        name: &str,
        index: usize,
        value: String,
    ) -> Result<Commit<String>, HubError> {
        let replica = self.get(name).await?;
        let mut hosted = replica.write().await;
        let commit = hosted
            .replica
            .insert(index, value)
            .map_err(|source| HubError::Edit {
                replica: name.to_string(),
                source,
            })?;
        Ok(commit.clone())
    }

    pub async fn set(
        &self,
        name: &str,
        index: usize,
        value: String,
    ) -> Result<Commit<String>, HubError> {
        let replica = self.get(name).await?;
        let mut hosted = replica.write().await;
        let commit = hosted
            .replica
            .set(index, value)
            .map_err(|source| HubError::Edit {
                replica: name.to_string(),
                source,
            })?;
        Ok(commit.clone())
    }

    /// Current list and log head
    pub async fn contents(&self, name: &str) -> Result<(Vec<String>, Version), HubError> {
        let replica = self.get(name).await?;
        let hosted = replica.read().await;
        Ok((hosted.replica.list().to_vec(), hosted.replica.log().head()))
    }

    pub async fn fetch(&self, name: &str, since: Version) -> Result<Vec<Commit<String>>, HubError> {
        let replica = self.get(name).await?;
        let hosted = replica.read().await;
        Ok(hosted.replica.log().commits_after(since).to_vec())
    }

    /// `local` pulls everything new from `from`
    ///
    /// Never holds two replica locks at once: the checkpoint is read, the
    /// batch copied out of the remote, and only then the local replica is
    /// locked for writing. A racing session on the same pair just finds
    /// some of the batch already consumed.
    pub async fn sync(&self, local: &str, from: &str) -> Result<SyncReport, HubError> {
        if local == from {
            return Err(HubError::SelfSync(local.to_string()));
        }

        let local_replica = self.get(local).await?;
        let remote_replica = self.get(from).await?;

        let source = remote_replica.read().await.replica.id();
        let (local_id, since) = {
            let hosted = local_replica.read().await;
            (hosted.replica.id(), hosted.replica.last_seen(source))
        };
        if local_id != ROOT && source != ROOT {
            return Err(HubError::SpokeSync {
                replica: local.to_string(),
                from: from.to_string(),
            });
        }

        let batch = remote_replica
            .read()
            .await
            .replica
            .log()
            .commits_after(since)
            .to_vec();

        let mut hosted = local_replica.write().await;
        match hosted.replica.integrate(source, &batch) {
            Ok(report) => {
                tracing::debug!(
                    "Synced {} from {}: {} applied, {} skipped, {} superseded",
                    local,
                    from,
                    report.applied,
                    report.skipped,
                    report.superseded
                );
                Ok(report)
            }
            Err(error) => {
                let commit = batch
                    .iter()
                    .find(|c| c.local_version == error.version())
                    .cloned()
                    .map(Box::new);
                tracing::warn!("Sync of {} from {} failed: {}", local, from, error);
                Err(HubError::Sync {
                    replica: local.to_string(),
                    from: from.to_string(),
                    source: error,
                    commit,
                })
            }
        }
    }

    pub async fn list_replicas(&self) -> Vec<ReplicaInfo> {
        let replicas: Vec<SharedReplica> = self.replicas.read().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(replicas.len());
        for replica in replicas {
            infos.push(replica.read().await.info());
        }
        infos.sort_by_key(|info| info.id);
        infos
    }
}
