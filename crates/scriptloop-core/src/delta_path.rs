#![forbid(unsafe_code)]

//! Structural addressing of UI slots.
//!
//! Every element a script emits lands in a slot of the UI tree. A
//! [`DeltaPath`] names that slot by position only:
//!
//! ```text
//! [root container, block index, block index, ..., element index]
//!  └─ Main = 0      └─ one entry per nesting level  └─ index in parent
//! ```
//!
//! Paths are rebuilt from scratch on every run. Two runs that emit "the same"
//! element at the same position produce equal paths, which is what lets the
//! forward queue replace stale content in place.
//!
//! # Example
//!
//! ```
//! use scriptloop_core::delta_path::{RootContainer, make_delta_path};
//!
//! let a = make_delta_path(RootContainer::Main, &[], 0);
//! let b = make_delta_path(RootContainer::Sidebar, &[], 0);
//! assert_ne!(a, b);
//! assert_eq!(a.as_slice(), &[0, 0]);
//! ```

use std::fmt;

use crate::error::InvalidDeltaPath;

/// Independent top-level UI trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootContainer {
    /// The main content area.
    Main,
    /// The sidebar.
    Sidebar,
}

impl RootContainer {
    /// Discriminant stored as the first path component.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Main => 0,
            Self::Sidebar => 1,
        }
    }

    /// Inverse of [`as_u32`](Self::as_u32).
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Main),
            1 => Some(Self::Sidebar),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Sidebar => "sidebar",
        }
    }
}

/// Flat, ordered address of one UI slot.
///
/// Always holds at least two components: the root container discriminant and
/// the element index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<u32>", into = "Vec<u32>")
)]
pub struct DeltaPath(Vec<u32>);

/// Build the path of the element at `index` inside the block reached by
/// `block_path` under `root`.
#[must_use]
pub fn make_delta_path(root: RootContainer, block_path: &[u32], index: u32) -> DeltaPath {
    DeltaPath::new(root, block_path, index)
}

impl DeltaPath {
    /// See [`make_delta_path`].
    #[must_use]
    pub fn new(root: RootContainer, block_path: &[u32], index: u32) -> Self {
        let mut parts = Vec::with_capacity(block_path.len() + 2);
        parts.push(root.as_u32());
        parts.extend_from_slice(block_path);
        parts.push(index);
        Self(parts)
    }

    /// Raw components, root discriminant first.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn root(&self) -> RootContainer {
        // Construction guarantees a valid discriminant.
        RootContainer::from_u32(self.0[0]).unwrap_or(RootContainer::Main)
    }

    /// Positions of the enclosing blocks, outermost first.
    #[must_use]
    pub fn block_path(&self) -> &[u32] {
        &self.0[1..self.0.len() - 1]
    }

    /// Index of the element inside its immediate parent.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    /// Nesting depth (0 for elements placed directly in a root container).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len() - 2
    }

    /// Path of the element at `index` inside the block that lives at `self`.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut parts = Vec::with_capacity(self.0.len() + 1);
        parts.extend_from_slice(&self.0);
        parts.push(index);
        Self(parts)
    }

    /// Path of the enclosing block, or `None` at the top level.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.depth() == 0 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl TryFrom<Vec<u32>> for DeltaPath {
    type Error = InvalidDeltaPath;

    fn try_from(parts: Vec<u32>) -> Result<Self, Self::Error> {
        if parts.len() < 2 {
            return Err(InvalidDeltaPath::TooShort { len: parts.len() });
        }
        if RootContainer::from_u32(parts[0]).is_none() {
            return Err(InvalidDeltaPath::UnknownRoot { value: parts[0] });
        }
        Ok(Self(parts))
    }
}

impl From<DeltaPath> for Vec<u32> {
    fn from(path: DeltaPath) -> Self {
        path.0
    }
}

impl fmt::Display for DeltaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root().name())?;
        for part in &self.0[1..] {
            write!(f, "/{part}")?;
        }
        Ok(())
    }
}
