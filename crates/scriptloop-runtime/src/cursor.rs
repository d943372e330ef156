#![forbid(unsafe_code)]

//! Slot allocation for script output.
//!
//! Each container hands out indices `0, 1, 2, ...` in emission order, so
//! rerunning the same script reproduces the same [`DeltaPath`]s and the
//! forward queue can fold the new output over the old.

use std::collections::HashMap;

use scriptloop_core::{DeltaPath, RootContainer};

/// A place output can be written into: a root container or a nested block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    root: RootContainer,
    block_path: Vec<u32>,
}

impl Container {
    #[must_use]
    pub fn main() -> Self {
        Self::root(RootContainer::Main)
    }

    #[must_use]
    pub fn sidebar() -> Self {
        Self::root(RootContainer::Sidebar)
    }

    #[must_use]
    pub fn root(root: RootContainer) -> Self {
        Self {
            root,
            block_path: Vec::new(),
        }
    }

    #[must_use]
    pub fn root_container(&self) -> RootContainer {
        self.root
    }

    #[must_use]
    pub fn block_path(&self) -> &[u32] {
        &self.block_path
    }

    /// Path of the slot at `index` within this container.
    #[must_use]
    pub fn slot_path(&self, index: u32) -> DeltaPath {
        DeltaPath::new(self.root, &self.block_path, index)
    }

    /// The block opened at `index` in this container.
    pub(crate) fn nested(&self, index: u32) -> Self {
        let mut block_path = self.block_path.clone();
        block_path.push(index);
        Self {
            root: self.root,
            block_path,
        }
    }
}

/// Handle to one emitted slot. Replacing or appending through it targets the
/// same path the slot was first written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    path: DeltaPath,
}

impl Slot {
    pub(crate) fn new(path: DeltaPath) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &DeltaPath {
        &self.path
    }
}

/// Per-run index counters, one per container.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    next: HashMap<Container, u32>,
}

impl Cursors {
    /// Claim the next slot in `container`.
    pub(crate) fn advance(&mut self, container: &Container) -> DeltaPath {
        let next = self.next.entry(container.clone()).or_insert(0);
        let path = container.slot_path(*next);
        *next += 1;
        path
    }

    /// Index the next [`advance`](Self::advance) would hand out.
    #[cfg(test)]
    pub(crate) fn peek(&self, container: &Container) -> u32 {
        self.next.get(container).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_count_up_per_container() {
        let mut cursors = Cursors::default();
        let main = Container::main();
        let sidebar = Container::sidebar();
        assert_eq!(cursors.advance(&main).to_string(), "main/0");
        assert_eq!(cursors.advance(&main).to_string(), "main/1");
        assert_eq!(cursors.advance(&sidebar).to_string(), "sidebar/0");
        assert_eq!(cursors.peek(&main), 2);
        assert_eq!(cursors.peek(&sidebar), 1);
    }

    #[test]
    fn nested_blocks_have_their_own_counters() {
        let mut cursors = Cursors::default();
        let main = Container::main();
        let block_path = cursors.advance(&main);
        let block = main.nested(block_path.index());
        assert_eq!(block.block_path(), &[0]);
        assert_eq!(cursors.advance(&block), DeltaPath::new(RootContainer::Main, &[0], 0));
        assert_eq!(cursors.advance(&main).index(), 1);
    }
}
