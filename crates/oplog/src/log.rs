use crate::commit::{Commit, LogicalTime, Provenance, ReplicaId, Stamp, Version};
use crate::operation::Operation;

/// Append-only log of the operations a replica has applied
///
/// Versions are dense: the commit with version N lives at position N - 1,
/// so every range query is a slice.
#[derive(Debug, Clone)]
pub struct CommitLog<T> {
    owner: ReplicaId,
    commits: Vec<Commit<T>>,
}

impl<T> CommitLog<T> {
    pub fn new(owner: ReplicaId) -> Self {
        CommitLog {
            owner,
            commits: Vec::new(),
        }
    }

    pub fn owner(&self) -> ReplicaId {
        self.owner
    }

    /// Append an operation, assigning the next version
    ///
    /// The author is the owner for local edits and the original author for
    /// relayed ones, so the commit can be recognized when it is reflected
    /// back.
    pub fn append(
        &mut self,
        operation: Operation<T>,
        provenance: Provenance,
        stamp: Stamp,
    ) -> &Commit<T> {
        let author = match provenance {
            Provenance::Local => self.owner,
            Provenance::Relayed { origin_author, .. } => origin_author,
        };

        self.commits.push(Commit {
            author,
            local_version: self.head() + 1,
            logical_time: stamp.logical_time,
            causal_checkpoint: stamp.causal_checkpoint,
            provenance,
            operation,
        });

        &self.commits[self.commits.len() - 1]
    }

    /// Highest version appended, 0 for an empty log
    pub fn head(&self) -> Version {
        self.commits.len() as Version
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn get(&self, version: Version) -> Option<&Commit<T>> {
        let at = usize::try_from(version).ok()?.checked_sub(1)?;
        self.commits.get(at)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Commit<T>> {
        self.commits.iter()
    }

    /// All commits with a version above `version`, ascending
    pub fn commits_after(&self, version: Version) -> &[Commit<T>] {
        self.commits_with_version_in(version, self.head())
    }

    /// Commits with versions in `(after, through]`, ascending
    pub fn commits_with_version_in(&self, after: Version, through: Version) -> &[Commit<T>] {
        let end = self.clamp(through);
        let start = self.clamp(after).min(end);
        &self.commits[start..end]
    }

    /// Commit with the greatest version stamped strictly before `time`
    pub fn last_commit_before(&self, time: LogicalTime) -> Option<&Commit<T>> {
        self.commits.iter().rev().find(|c| c.logical_time < time)
    }

    fn clamp(&self, version: Version) -> usize {
        usize::try_from(version).map_or(self.commits.len(), |v| v.min(self.commits.len()))
    }
}

impl<'a, T> IntoIterator for &'a CommitLog<T> {
    type Item = &'a Commit<T>;
    type IntoIter = std::slice::Iter<'a, Commit<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.commits.iter()
    }
}
