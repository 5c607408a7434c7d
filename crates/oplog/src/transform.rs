use crate::commit::{Commit, LogicalTime, Provenance, ReplicaId};
use crate::operation::Operation;

/// Where a concurrent remote insertion lands relative to local-only
/// positions in the same gap.
///
/// Insertions are ordered by the stamp their author gave them: edits
/// stamped before the remote operation precede it, later ones follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Preceding,
    Following,
}

impl Side {
    /// Side of `commit` relative to an edit with identity `origin`
    pub fn of<T>(commit: &Commit<T>, origin: (LogicalTime, ReplicaId)) -> Self {
        if commit.origin() < origin {
            Side::Preceding
        } else {
            Side::Following
        }
    }
}

/// A run of `offset` local-only positions starting at `key`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub key: usize,
    pub offset: usize,
    pub side: Side,
}

impl Threshold {
    fn end(&self) -> usize {
        self.key + self.offset
    }
}

/// Index translation from a remote author's view of the list into the
/// applier's current list.
///
/// Built fresh for every incoming commit from the slice of the local log
/// the author had not seen, then dropped. Thresholds are keyed by
/// position in the applier's list and kept sorted; every index at or past
/// a threshold the walk reaches is pushed past its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformIndexMap {
    thresholds: Vec<Threshold>,
    collapse: bool,
}

impl Default for TransformIndexMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformIndexMap {
    pub fn new() -> Self {
        TransformIndexMap {
            thresholds: Vec::new(),
            collapse: true,
        }
    }

    /// A map that never merges neighbouring runs. Answers every query the
    /// same way as the collapsed map, it just stores one entry per position.
    pub fn uncollapsed() -> Self {
        TransformIndexMap {
            thresholds: Vec::new(),
            collapse: false,
        }
    }

    /// Map over a causal window of the local log
    ///
    /// `source` is the replica the incoming commit was fetched from:
    /// relayed commits copied from its log are already part of its view.
    pub fn build<'a, T: 'a>(
        window: impl IntoIterator<Item = &'a Commit<T>>,
        source: ReplicaId,
    ) -> Self {
        let mut map = Self::new();
        map.extend(window, source, Side::Preceding);
        map
    }

    /// Map over local history concurrent with the edit identified by
    /// `origin`, each commit placed by its own author's stamp
    ///
    /// A relay is stamped when it is appended, which can be long after its
    /// author made the edit, so log order alone does not give the side.
    pub fn around<'a, T: 'a>(
        concurrent: impl IntoIterator<Item = &'a Commit<T>>,
        source: ReplicaId,
        origin: (LogicalTime, ReplicaId),
    ) -> Self {
        let mut map = Self::new();
        for commit in concurrent {
            map.record(commit, source, Side::of(commit, origin));
        }
        map
    }

    pub fn extend<'a, T: 'a>(
        &mut self,
        commits: impl IntoIterator<Item = &'a Commit<T>>,
        source: ReplicaId,
        side: Side,
    ) {
        for commit in commits {
            self.record(commit, source, side);
        }
    }

    /// Fold one commit into the map. Sets never move positions.
    pub fn record<T>(&mut self, commit: &Commit<T>, source: ReplicaId, side: Side) {
        let index = match &commit.operation {
            Operation::Insert { index, .. } => *index,
            Operation::Set { .. } => return,
        };

        match commit.provenance {
            Provenance::Relayed { source: from, .. } if from == source => {
                self.record_shared(index)
            }
            Provenance::Local | Provenance::Relayed { .. } => self.record_unseen(index, side),
        }
    }

    /// An insertion the remote author has not seen: one more local-only
    /// position at `index`
    fn record_unseen(&mut self, index: usize, side: Side) {
        self.open_slot(index);
        let at = self.thresholds.partition_point(|t| t.key < index);
        self.thresholds.insert(
            at,
            Threshold {
                key: index,
                offset: 1,
                side,
            },
        );
        self.normalize();
    }

    /// An insertion both sides hold: it adds no offset of its own, but the
    /// positions behind it move up by one
    fn record_shared(&mut self, index: usize) {
        self.open_slot(index);
        self.normalize();
    }

    // Make room at `at`: split the run straddling it and move every run at
    // or past it up one key
    fn open_slot(&mut self, at: usize) {
        let straddling = self
            .thresholds
            .partition_point(|t| t.key < at)
            .checked_sub(1)
            .filter(|&i| self.thresholds[i].end() > at);

        if let Some(i) = straddling {
            let run = self.thresholds[i];
            self.thresholds[i].offset = at - run.key;
            self.thresholds.insert(
                i + 1,
                Threshold {
                    key: at,
                    offset: run.end() - at,
                    side: run.side,
                },
            );
        }

        for threshold in self.thresholds.iter_mut().filter(|t| t.key >= at) {
            threshold.key += 1;
        }
    }

    fn normalize(&mut self) {
        self.thresholds.retain(|t| t.offset > 0);
        self.thresholds.sort_by_key(|t| t.key);

        if !self.collapse {
            return;
        }

        let mut collapsed: Vec<Threshold> = Vec::with_capacity(self.thresholds.len());
        for threshold in self.thresholds.drain(..) {
            match collapsed.last_mut() {
                Some(last) if last.side == threshold.side && threshold.key <= last.end() => {
                    last.offset += threshold.offset;
                }
                _ => collapsed.push(threshold),
            }
        }
        self.thresholds = collapsed;
    }

    /// Position in the applier's list of the element the author saw at
    /// `index`
    pub fn transform(&self, index: usize) -> usize {
        self.thresholds.iter().fold(index, |at, t| {
            if at >= t.key {
                at + t.offset
            } else {
                at
            }
        })
    }

    /// Position in the applier's list for an insertion the author made at
    /// `index`
    ///
    /// The insertion belongs to the gap of local-only positions between the
    /// elements the author saw at `index - 1` and `index`. Within it, it goes
    /// right after the last run that precedes it.
    pub fn transform_insert(&self, index: usize) -> usize {
        let gap_start = match index.checked_sub(1) {
            Some(previous) => self.transform(previous) + 1,
            None => 0,
        };
        let gap_end = self.transform(index);

        self.thresholds
            .iter()
            .filter(|t| t.side == Side::Preceding && t.key >= gap_start && t.key < gap_end)
            .map(Threshold::end)
            .max()
            .unwrap_or(gap_start)
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn is_identity(&self) -> bool {
        self.thresholds.is_empty()
    }
}
