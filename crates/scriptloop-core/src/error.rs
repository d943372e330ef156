#![forbid(unsafe_code)]

//! Error types for path construction and queue reconciliation.

use std::fmt;

use crate::delta_path::DeltaPath;
use crate::table::ShapeMismatch;

/// A raw component list that does not form a valid [`DeltaPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidDeltaPath {
    /// Fewer than two components (root and index are both required).
    TooShort { len: usize },
    /// The first component is not a known root container.
    UnknownRoot { value: u32 },
}

impl fmt::Display for InvalidDeltaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => {
                write!(f, "delta path needs at least 2 components, got {len}")
            }
            Self::UnknownRoot { value } => write!(f, "unknown root container {value}"),
        }
    }
}

impl std::error::Error for InvalidDeltaPath {}

/// Errors returned by [`ForwardQueue::enqueue`](crate::forward_queue::ForwardQueue::enqueue).
///
/// The queue is unchanged whenever an error is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// Appended rows do not fit the table already queued at `path`.
    ShapeMismatch {
        path: DeltaPath,
        mismatch: ShapeMismatch,
    },
    /// Rows were appended to a slot whose queued element is not a table.
    NotTabular { path: DeltaPath },
}

impl EnqueueError {
    /// Slot the rejected message was addressed to.
    #[must_use]
    pub fn path(&self) -> &DeltaPath {
        match self {
            Self::ShapeMismatch { path, .. } | Self::NotTabular { path } => path,
        }
    }
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { path, mismatch } => {
                write!(f, "cannot append rows at {path}: {mismatch}")
            }
            Self::NotTabular { path } => {
                write!(f, "cannot append rows at {path}: element is not a table")
            }
        }
    }
}

impl std::error::Error for EnqueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ShapeMismatch { mismatch, .. } => Some(mismatch),
            Self::NotTabular { .. } => None,
        }
    }
}
