use serde::{Deserialize, Serialize};
use std::fmt;

// Edits a replica can make to its list
// `index` is relative to the list as the author saw it when authoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation<T> {
    // Insert(index, value) - value ends up at `index`, later elements shift right
    Insert { index: usize, value: T },

    // Set(index, value) - replaces the element at `index`
    Set { index: usize, value: T },
}

impl<T> Operation<T> {
    pub fn index(&self) -> usize {
        match self {
            Operation::Insert { index, .. } | Operation::Set { index, .. } => *index,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Set { .. } => OperationKind::Set,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Operation::Insert { .. })
    }

    /// Same operation retargeted at another index
    pub fn at(&self, index: usize) -> Self
    where
        T: Clone,
    {
        match self {
            Operation::Insert { value, .. } => Operation::Insert {
                index,
                value: value.clone(),
            },
            Operation::Set { value, .. } => Operation::Set {
                index,
                value: value.clone(),
            },
        }
    }

    /// Whether `index` addresses a valid position in a list of `len` elements.
    /// Inserts may append (`index == len`), sets must hit an existing element.
    pub fn fits(&self, len: usize) -> bool {
        match self {
            Operation::Insert { index, .. } => *index <= len,
            Operation::Set { index, .. } => *index < len,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Set,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => f.write_str("insert"),
            OperationKind::Set => f.write_str("set"),
        }
    }
}
