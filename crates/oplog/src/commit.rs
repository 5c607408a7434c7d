use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Position of a commit in the log that holds it. The Nth append gets version N.
pub type Version = u64;

/// Tag drawn from the injected clock, used for the causal cut-off and tie-breaks
pub type LogicalTime = u64;

/// Identity of a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(pub u32);

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Highest version consumed from each peer's log
///
/// Carried on every commit so that whoever applies it later can look up
/// how much of *its own* log the author had already incorporated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(BTreeMap<ReplicaId, Version>);

impl Checkpoint {
    pub fn new() -> Self {
        Checkpoint(BTreeMap::new())
    }

    /// Version consumed from `replica`, 0 if nothing was
    pub fn get(&self, replica: ReplicaId) -> Version {
        self.0.get(&replica).copied().unwrap_or(0)
    }

    /// Raise the entry for `replica` to `version`, never lowering it
    pub fn observe(&mut self, replica: ReplicaId, version: Version) {
        let entry = self.0.entry(replica).or_insert(0);
        *entry = (*entry).max(version);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, Version)> + '_ {
        self.0.iter().map(|(id, v)| (*id, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ReplicaId, Version)> for Checkpoint {
    fn from_iter<I: IntoIterator<Item = (ReplicaId, Version)>>(iter: I) -> Self {
        let mut checkpoint = Checkpoint::new();
        for (replica, version) in iter {
            checkpoint.observe(replica, version);
        }
        checkpoint
    }
}

// Where the operation in a commit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    // Authored on this replica
    Local,

    // Applied on behalf of a remote commit fetched from `source`'s log.
    // origin_version is that commit's version in `source`'s log and
    // origin_index the index it carried there. origin_time is the stamp the
    // author gave the edit, unchanged however many relays it went through.
    Relayed {
        source: ReplicaId,
        origin_author: ReplicaId,
        origin_version: Version,
        origin_index: usize,
        origin_time: LogicalTime,
    },
}

impl Provenance {
    /// Replica whose log this commit was copied from, if any
    pub fn source(&self) -> Option<ReplicaId> {
        match self {
            Provenance::Local => None,
            Provenance::Relayed { source, .. } => Some(*source),
        }
    }
}

/// Causal context threaded into every append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub logical_time: LogicalTime,
    pub causal_checkpoint: Checkpoint,
}

/// One applied operation, immutable once appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit<T> {
    pub author: ReplicaId,
    pub local_version: Version,
    pub logical_time: LogicalTime,
    pub causal_checkpoint: Checkpoint,
    pub provenance: Provenance,
    pub operation: Operation<T>,
}

impl<T> Commit<T> {
    /// Checkpoint the author held against `applier`'s log
    pub fn checkpoint_for(&self, applier: ReplicaId) -> Version {
        self.causal_checkpoint.get(applier)
    }

    /// A commit handed back to the replica it came from: either its own
    /// operation, or something it relayed itself
    pub fn reflects(&self, replica: ReplicaId) -> bool {
        self.author == replica || self.provenance.source() == Some(replica)
    }

    /// Stamp the author gave the edit. A relay keeps it while getting a
    /// fresh `logical_time` of its own.
    pub fn origin_time(&self) -> LogicalTime {
        match self.provenance {
            Provenance::Local => self.logical_time,
            Provenance::Relayed { origin_time, .. } => origin_time,
        }
    }

    /// Identity of the edit across every log holding a copy of it
    ///
    /// Ordered by the author's stamp first, so concurrent edits compare by
    /// time with the author id breaking ties.
    pub fn origin(&self) -> (LogicalTime, ReplicaId) {
        (self.origin_time(), self.author)
    }
}
