use crate::clock::Clock;
use crate::commit::{Checkpoint, Commit, LogicalTime, Provenance, ReplicaId, Stamp, Version};
use crate::error::{PullError, ReconcileError, SyncError};
use crate::log::CommitLog;
use crate::operation::Operation;
use crate::reconcile::{reconcile, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use tracing::{debug, trace, warn};

/// Anything that can hand out the commits of one replica's log
///
/// `fetch(since)` returns exactly the commits with a version above `since`,
/// ascending. Errors are the transport's own and are passed through as is.
pub trait CommitSource<T> {
    type Error;

    fn source_id(&self) -> ReplicaId;

    fn fetch(&self, since: Version) -> Result<Vec<Commit<T>>, Self::Error>;
}

/// What one sync session did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub source: ReplicaId,
    pub applied: usize,
    pub skipped: usize,
    pub superseded: usize,
    /// Checkpoint against `source` once the session finished
    pub last_seen: Version,
}

impl SyncReport {
    fn new(source: ReplicaId, last_seen: Version) -> Self {
        SyncReport {
            source,
            applied: 0,
            skipped: 0,
            superseded: 0,
            last_seen,
        }
    }

    /// Number of remote commits consumed
    pub fn consumed(&self) -> usize {
        self.applied + self.skipped + self.superseded
    }
}

/// One independent copy of the list
///
/// Owns the list, the log that explains it and a checkpoint per peer.
/// Every mutation goes through `&mut self`, so a sync session or local edit
/// is never interleaved with another on the same replica.
#[derive(Debug)]
pub struct Replica<T> {
    id: ReplicaId,
    list: Vec<T>,
    log: CommitLog<T>,
    last_seen: Checkpoint,
    // every edit applied or superseded here, by Commit::origin
    incorporated: BTreeSet<(LogicalTime, ReplicaId)>,
    clock: Box<dyn Clock>,
}

impl<T: Clone> Replica<T> {
    pub fn new(id: ReplicaId, clock: impl Clock + 'static) -> Self {
        Replica {
            id,
            list: Vec::new(),
            log: CommitLog::new(id),
            last_seen: Checkpoint::new(),
            incorporated: BTreeSet::new(),
            clock: Box::new(clock),
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn list(&self) -> &[T] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn log(&self) -> &CommitLog<T> {
        &self.log
    }

    /// Highest version of `remote`'s log consumed so far
    pub fn last_seen(&self, remote: ReplicaId) -> Version {
        self.last_seen.get(remote)
    }

    /// Local insert at `index` of the current list
    pub fn insert(&mut self, index: usize, value: T) -> Result<&Commit<T>, ReconcileError> {
        self.edit(Operation::Insert { index, value })
    }

    /// Local replace of the element at `index`
    pub fn set(&mut self, index: usize, value: T) -> Result<&Commit<T>, ReconcileError> {
        self.edit(Operation::Set { index, value })
    }

    fn edit(&mut self, operation: Operation<T>) -> Result<&Commit<T>, ReconcileError> {
        if !operation.fits(self.list.len()) {
            return Err(ReconcileError::MalformedOperation {
                kind: operation.kind(),
                index: operation.index(),
                len: self.list.len(),
            });
        }

        self.apply(&operation);
        let stamp = self.stamp();
        let commit = self.log.append(operation, Provenance::Local, stamp);
        self.incorporated.insert(commit.origin());
        trace!(
            replica = %commit.author,
            version = commit.local_version,
            time = commit.logical_time,
            "local edit"
        );
        Ok(commit)
    }

    /// Apply a reconciled remote operation at `index` and append the
    /// derived commit, returning its local version
    pub(crate) fn apply_relayed(
        &mut self,
        source: ReplicaId,
        remote: &Commit<T>,
        index: usize,
    ) -> Version {
        let operation = remote.operation.at(index);
        self.apply(&operation);

        let provenance = Provenance::Relayed {
            source,
            origin_author: remote.author,
            origin_version: remote.local_version,
            origin_index: remote.operation.index(),
            origin_time: remote.origin_time(),
        };
        let stamp = self.stamp();
        self.log.append(operation, provenance, stamp).local_version
    }

    // Callers check bounds first
    fn apply(&mut self, operation: &Operation<T>) {
        match operation {
            Operation::Insert { index, value } => self.list.insert(*index, value.clone()),
            Operation::Set { index, value } => self.list[*index] = value.clone(),
        }
    }

    fn stamp(&self) -> Stamp {
        Stamp {
            logical_time: self.clock.tick(),
            causal_checkpoint: self.last_seen.clone(),
        }
    }

    /// Pull everything `remote` has that this replica has not consumed yet
    pub fn sync_from(&mut self, remote: &Replica<T>) -> Result<SyncReport, SyncError> {
        let since = self.last_seen(remote.id);
        self.integrate(remote.id, remote.log.commits_after(since))
    }

    /// Sync through a transport
    pub fn pull<S>(&mut self, source: &S) -> Result<SyncReport, PullError<S::Error>>
    where
        S: CommitSource<T>,
    {
        let remote = source.source_id();
        let commits = source
            .fetch(self.last_seen(remote))
            .map_err(PullError::Transport)?;
        Ok(self.integrate(remote, &commits)?)
    }

    /// Consume a batch fetched from `source`'s log, in ascending version order
    ///
    /// Versions already consumed are ignored, so an overlapping or repeated
    /// batch is harmless. Commits this replica authored or relayed itself
    /// are skipped. Any other copy of an edit already incorporated means the
    /// edit took two paths here, and stops the session. The checkpoint
    /// advances after every commit, so a batch that fails halfway can
    /// simply be fetched again.
    pub fn integrate<'a>(
        &mut self,
        source: ReplicaId,
        commits: impl IntoIterator<Item = &'a Commit<T>>,
    ) -> Result<SyncReport, SyncError>
    where
        T: 'a,
    {
        let mut report = SyncReport::new(source, self.last_seen(source));

        for commit in commits {
            let seen = self.last_seen(source);
            if commit.local_version <= seen {
                continue;
            }
            if commit.local_version != seen + 1 {
                return Err(SyncError::Gap {
                    remote: source,
                    expected_after: seen,
                    found: commit.local_version,
                });
            }

            if commit.reflects(self.id) {
                trace!(
                    replica = %self.id,
                    %source,
                    version = commit.local_version,
                    "skipping reflected commit"
                );
                report.skipped += 1;
            } else if self.incorporated.contains(&commit.origin()) {
                warn!(
                    replica = %self.id,
                    %source,
                    author = %commit.author,
                    version = commit.local_version,
                    "edit already arrived through another peer"
                );
                return Err(SyncError::Duplicate {
                    remote: source,
                    author: commit.author,
                    version: commit.local_version,
                });
            } else {
                match reconcile(self, source, commit) {
                    Ok(Outcome::Applied { .. }) => report.applied += 1,
                    Ok(Outcome::Superseded) => report.superseded += 1,
                    Err(reason) => {
                        warn!(
                            replica = %self.id,
                            %source,
                            author = %commit.author,
                            version = commit.local_version,
                            error = %reason,
                            "rejecting remote commit"
                        );
                        return Err(SyncError::Rejected {
                            remote: source,
                            author: commit.author,
                            version: commit.local_version,
                            reason,
                        });
                    }
                }
                self.incorporated.insert(commit.origin());
            }

            self.last_seen.observe(source, commit.local_version);
            report.last_seen = commit.local_version;
        }

        debug!(
            replica = %self.id,
            %source,
            applied = report.applied,
            skipped = report.skipped,
            superseded = report.superseded,
            last_seen = report.last_seen,
            "sync finished"
        );

        Ok(report)
    }
}

impl<T: Clone> CommitSource<T> for Replica<T> {
    type Error = Infallible;

    fn source_id(&self) -> ReplicaId {
        self.id
    }

    fn fetch(&self, since: Version) -> Result<Vec<Commit<T>>, Infallible> {
        Ok(self.log.commits_after(since).to_vec())
    }
}
