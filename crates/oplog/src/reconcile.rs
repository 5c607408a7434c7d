// Reconciliation of one remote commit against local history

use crate::commit::{Commit, LogicalTime, ReplicaId, Version};
use crate::error::ReconcileError;
use crate::log::CommitLog;
use crate::operation::{Operation, OperationKind};
use crate::replica::Replica;
use crate::transform::TransformIndexMap;
use tracing::{debug, trace};

/// Where a remote commit belongs in the local list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Local version the author had already incorporated (v0)
    pub causal_floor: Version,

    /// Last local version stamped before the incoming commit (v1)
    pub causal_cutoff: Version,

    pub corrected_index: usize,

    /// A concurrent Set whose author stamped it later already owns the
    /// target element
    pub superseded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied { index: usize, version: Version },
    Superseded,
}

/// Plan a remote commit against `log` without touching anything
///
/// `source` is the replica whose log the commit was fetched from and
/// `list_len` the current length of the list `log` describes.
pub fn resolve<T>(
    log: &CommitLog<T>,
    list_len: usize,
    source: ReplicaId,
    remote: &Commit<T>,
) -> Result<Resolution, ReconcileError> {
    let head = log.head();
    let causal_floor = remote.checkpoint_for(log.owner());
    let causal_cutoff = log
        .last_commit_before(remote.logical_time)
        .map_or(0, |c| c.local_version);

    // also catches a floor past the head, since the cut-off never is
    if causal_cutoff < causal_floor {
        return Err(ReconcileError::CausalityViolation {
            checkpoint: causal_floor,
            cutoff: causal_cutoff,
            head,
        });
    }

    // The cut-off uses the stamp of the commit as fetched. Ordering against
    // concurrent edits uses the stamps their authors gave them.
    let origin = remote.origin();
    let map = TransformIndexMap::around(log.commits_after(causal_floor), source, origin);

    let index = remote.operation.index();
    let (corrected_index, in_bounds) = match remote.operation.kind() {
        OperationKind::Insert => {
            let corrected = map.transform_insert(index);
            (corrected, corrected <= list_len)
        }
        OperationKind::Set => {
            let corrected = map.transform(index);
            (corrected, corrected < list_len)
        }
    };

    trace!(
        floor = causal_floor,
        cutoff = causal_cutoff,
        head,
        index,
        corrected_index,
        thresholds = map.thresholds().len(),
        "resolved remote index"
    );

    if !in_bounds {
        return Err(ReconcileError::MalformedOperation {
            kind: remote.operation.kind(),
            index: corrected_index,
            len: list_len,
        });
    }

    let superseded = !remote.operation.is_insert()
        && overwritten_later(log.commits_after(causal_floor), source, corrected_index, origin);

    Ok(Resolution {
        causal_floor,
        causal_cutoff,
        corrected_index,
        superseded,
    })
}

/// Apply one remote commit to `local` and record it in the local log
pub fn reconcile<T: Clone>(
    local: &mut Replica<T>,
    source: ReplicaId,
    remote: &Commit<T>,
) -> Result<Outcome, ReconcileError> {
    let resolution = resolve(local.log(), local.len(), source, remote)?;

    if resolution.superseded {
        debug!(
            replica = %local.id(),
            author = %remote.author,
            version = remote.local_version,
            "remote set superseded by a later local set"
        );
        return Ok(Outcome::Superseded);
    }

    let index = resolution.corrected_index;
    let version = local.apply_relayed(source, remote, index);

    debug!(
        replica = %local.id(),
        %source,
        author = %remote.author,
        remote_version = remote.local_version,
        origin_index = remote.operation.index(),
        index,
        version,
        "applied remote commit"
    );

    Ok(Outcome::Applied { index, version })
}

// Did an unseen Set made after `origin` write the element now at `target`?
fn overwritten_later<T>(
    window: &[Commit<T>],
    source: ReplicaId,
    target: usize,
    origin: (LogicalTime, ReplicaId),
) -> bool {
    window.iter().enumerate().any(|(at, commit)| {
        let unseen = commit.provenance.source() != Some(source);
        match &commit.operation {
            Operation::Set { index, .. } if unseen && commit.origin() > origin => {
                carry_forward(*index, &window[at + 1..]) == target
            }
            _ => false,
        }
    })
}

// Follow an element through the insertions made after it was addressed
fn carry_forward<T>(mut index: usize, later: &[Commit<T>]) -> usize {
    for commit in later {
        if let Operation::Insert { index: at, .. } = &commit.operation {
            if *at <= index {
                index += 1;
            }
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::resolve;
    use crate::{
        Checkpoint, Commit, CommitLog, Operation, OperationKind, Provenance, ReconcileError,
        ReplicaId, Stamp,
    };

    const LOCAL: ReplicaId = ReplicaId(1);
    const REMOTE: ReplicaId = ReplicaId(2);

    fn local_log(ops: &[(Operation<char>, u64)]) -> CommitLog<char> {
        let mut log = CommitLog::new(LOCAL);
        for (op, time) in ops {
            log.append(
                op.clone(),
                Provenance::Local,
                Stamp {
                    logical_time: *time,
                    causal_checkpoint: Checkpoint::new(),
                },
            );
        }
        log
    }

    fn remote(operation: Operation<char>, time: u64, seen: u64) -> Commit<char> {
        Commit {
            author: REMOTE,
            local_version: 1,
            logical_time: time,
            causal_checkpoint: [(LOCAL, seen)].into_iter().collect(),
            provenance: Provenance::Local,
            operation,
        }
    }

    // `operation` by replica 3, made at `made` and relayed by REMOTE at `time`
    fn relayed(operation: Operation<char>, made: u64, time: u64, seen: u64) -> Commit<char> {
        let origin_index = operation.index();
        Commit {
            author: ReplicaId(3),
            provenance: Provenance::Relayed {
                source: ReplicaId(3),
                origin_author: ReplicaId(3),
                origin_version: 1,
                origin_index,
                origin_time: made,
            },
            ..remote(operation, time, seen)
        }
    }

    fn insert(index: usize, value: char) -> Operation<char> {
        Operation::Insert { index, value }
    }

    fn set(index: usize, value: char) -> Operation<char> {
        Operation::Set { index, value }
    }

    #[test]
    fn test_window_bounds() {
        let log = local_log(&[(insert(0, 'a'), 1), (insert(1, 'b'), 3), (insert(2, 'c'), 5)]);

        let resolution = resolve(&log, 3, REMOTE, &remote(insert(1, 'x'), 4, 1)).unwrap();
        assert_eq!(resolution.causal_floor, 1);
        assert_eq!(resolution.causal_cutoff, 2);
        // 'b' was stamped earlier and stays in front, 'c' was stamped later
        // and moves behind
        assert_eq!(resolution.corrected_index, 2);
        assert!(!resolution.superseded);
    }

    #[test]
    fn test_checkpoint_past_head_is_a_causality_violation() {
        let log = local_log(&[(insert(0, 'a'), 1)]);
        let err = resolve(&log, 1, REMOTE, &remote(insert(0, 'x'), 9, 3)).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::CausalityViolation {
                checkpoint: 3,
                cutoff: 1,
                head: 1
            }
        );
    }

    #[test]
    fn test_checkpoint_past_cutoff_is_a_causality_violation() {
        let log = local_log(&[(insert(0, 'a'), 1), (insert(1, 'b'), 5)]);
        // claims to have seen version 2 while being stamped before it
        let err = resolve(&log, 2, REMOTE, &remote(insert(0, 'x'), 3, 2)).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::CausalityViolation {
                checkpoint: 2,
                cutoff: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_range_set_is_malformed() {
        let log = local_log(&[(insert(0, 'a'), 1)]);
        let err = resolve(&log, 1, REMOTE, &remote(set(1, 'x'), 2, 1)).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::MalformedOperation {
                kind: OperationKind::Set,
                index: 1,
                len: 1
            }
        );
    }

    #[test]
    fn test_out_of_range_insert_is_malformed() {
        let log = local_log(&[]);
        let err = resolve(&log, 0, REMOTE, &remote(insert(1, 'x'), 2, 0)).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MalformedOperation {
                kind: OperationKind::Insert,
                index: 1,
                len: 0
            }
        ));
    }

    #[test]
    fn test_later_local_set_supersedes() {
        let log = local_log(&[(insert(0, 'a'), 1), (set(0, 'l'), 5)]);

        let earlier = resolve(&log, 1, REMOTE, &remote(set(0, 'r'), 4, 1)).unwrap();
        assert!(earlier.superseded);

        let later = resolve(&log, 1, REMOTE, &remote(set(0, 'r'), 6, 1)).unwrap();
        assert!(!later.superseded);
    }

    #[test]
    fn test_local_set_is_followed_through_later_inserts() {
        let log = local_log(&[(insert(0, 'a'), 1), (set(0, 'l'), 5), (insert(0, 'z'), 6)]);

        // the remote still addresses 'a' at 0, which now sits at 1
        let resolution = resolve(&log, 2, REMOTE, &remote(set(0, 'r'), 4, 1)).unwrap();
        assert_eq!(resolution.corrected_index, 1);
        assert!(resolution.superseded);
    }

    #[test]
    fn test_relayed_set_keeps_its_author_stamp() {
        let log = local_log(&[(insert(0, 'a'), 1), (set(0, 'l'), 5)]);

        // made before the local set, relayed after it
        let stale = resolve(&log, 1, REMOTE, &relayed(set(0, 'r'), 4, 8, 1)).unwrap();
        assert_eq!(stale.causal_cutoff, 2);
        assert!(stale.superseded);

        let fresh = resolve(&log, 1, REMOTE, &relayed(set(0, 'r'), 6, 8, 1)).unwrap();
        assert!(!fresh.superseded);
    }

    #[test]
    fn test_relayed_insert_is_ordered_by_its_author_stamp() {
        let log = local_log(&[(insert(0, 'a'), 1), (insert(1, 'b'), 3)]);

        // made before 'b' even though the relay was stamped after it
        let early = resolve(&log, 2, REMOTE, &relayed(insert(1, 'x'), 2, 6, 1)).unwrap();
        assert_eq!(early.causal_cutoff, 2);
        assert_eq!(early.corrected_index, 1);

        let late = resolve(&log, 2, REMOTE, &relayed(insert(1, 'x'), 4, 6, 1)).unwrap();
        assert_eq!(late.corrected_index, 2);
    }
}
