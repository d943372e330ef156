#![forbid(unsafe_code)]

//! Self-compacting queue of outbound render messages.
//!
//! Scripts rerun from the top on every change, so the same UI slot is
//! written many times. The [`ForwardQueue`] folds those writes together
//! before anything is flushed to the renderer:
//!
//! ```text
//! enqueue(NewRun)                     [NewRun]
//! enqueue(main/0 = "text1")           [NewRun, main/0 "text1"]
//! enqueue(main/1 = table A)           [NewRun, main/0 "text1", main/1 A]
//! enqueue(main/0 = "text2")           [NewRun, main/0 "text2", main/1 A]
//! enqueue(main/1 += rows B)           [NewRun, main/0 "text2", main/1 A+B]
//! ```
//!
//! # Merge rules
//!
//! 1. Pathless messages append in arrival order.
//! 2. `NewElement` / `NewBlock` at a path already queued replace that entry
//!    in place, discarding rows folded into the old element.
//! 3. `AddRows` at a path whose queued entry is a table folds into it.
//!    A path with nothing queued gets the rows appended as a standalone
//!    entry, and later rows at that path fold into it.
//!
//! # Invariants
//!
//! - At most one entry per distinct [`DeltaPath`].
//! - Distinct paths keep the order of their first appearance.
//! - A rejected enqueue leaves the queue unchanged.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Rows with a different column count/type | `EnqueueError::ShapeMismatch` |
//! | Rows at a slot holding a non-table | `EnqueueError::NotTabular` |
//! | Rows at a slot with nothing queued | Appended standalone, logged |
//! | Lock poisoned by a panicking producer | Lock is recovered, contents kept |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::delta_path::DeltaPath;
use crate::error::EnqueueError;
use crate::message::{Delta, Element, ForwardMsg};
use crate::table::Table;

/// Thread-safe reconciling message queue.
///
/// Producers (the script thread) call [`enqueue`](Self::enqueue); a consumer
/// on another thread calls [`flush`](Self::flush). Every operation takes the
/// internal lock once.
#[derive(Default)]
pub struct ForwardQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    messages: Vec<ForwardMsg>,
    /// Position in `messages` of the entry recorded for each path.
    delta_index: HashMap<DeltaPath, usize>,
}

impl ForwardQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in Arc for sharing between producer and consumer.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Add a message, merging it into a queued entry where the rules allow.
    pub fn enqueue(&self, msg: ForwardMsg) -> Result<(), EnqueueError> {
        self.lock().enqueue(msg)
    }

    /// Remove and return everything queued, in order.
    pub fn flush(&self) -> Vec<ForwardMsg> {
        let mut inner = self.lock();
        inner.delta_index.clear();
        let flushed = std::mem::take(&mut inner.messages);
        crate::trace!(count = flushed.len(), "forward queue flushed");
        flushed
    }

    /// Discard everything queued.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.messages.clear();
        inner.delta_index.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    /// Copy of the current contents without draining them.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ForwardMsg> {
        self.lock().messages.clone()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ForwardQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ForwardQueue")
            .field("messages", &inner.messages.len())
            .field("paths", &inner.delta_index.len())
            .finish()
    }
}

impl QueueInner {
    fn enqueue(&mut self, msg: ForwardMsg) -> Result<(), EnqueueError> {
        match msg {
            ForwardMsg::Delta {
                path,
                delta: Delta::AddRows(rows),
            } => self.fold_rows(path, rows),
            ForwardMsg::Delta { path, delta } => {
                self.put_delta(path, delta);
                Ok(())
            }
            other => {
                self.messages.push(other);
                Ok(())
            }
        }
    }

    fn put_delta(&mut self, path: DeltaPath, delta: Delta) {
        match self.delta_index.get(&path) {
            Some(&pos) => {
                crate::trace!(path = %path, pos, "replacing queued delta");
                self.messages[pos] = ForwardMsg::Delta { path, delta };
            }
            None => {
                self.delta_index.insert(path.clone(), self.messages.len());
                self.messages.push(ForwardMsg::Delta { path, delta });
            }
        }
    }

    fn fold_rows(&mut self, path: DeltaPath, rows: Table) -> Result<(), EnqueueError> {
        let Some(&pos) = self.delta_index.get(&path) else {
            crate::debug!(path = %path, "rows appended with no queued base element");
            self.delta_index.insert(path.clone(), self.messages.len());
            self.messages.push(ForwardMsg::add_rows(path, rows));
            return Ok(());
        };

        let base = match &mut self.messages[pos] {
            ForwardMsg::Delta {
                delta: Delta::NewElement(Element::Table(table)),
                ..
            }
            | ForwardMsg::Delta {
                delta: Delta::AddRows(table),
                ..
            } => table,
            _ => return Err(EnqueueError::NotTabular { path }),
        };
        base.append_rows(&rows)
            .map_err(|mismatch| EnqueueError::ShapeMismatch { path, mismatch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta_path::{RootContainer, make_delta_path};
    use crate::message::{BlockKind, RunMetadata};
    use crate::table::Column;

    fn new_run() -> ForwardMsg {
        ForwardMsg::NewRun(RunMetadata::default())
    }

    fn text(root: RootContainer, blocks: &[u32], index: u32, body: &str) -> ForwardMsg {
        ForwardMsg::new_element(make_delta_path(root, blocks, index), Element::text(body))
    }

    fn ints(cols: &[&[i64]]) -> Table {
        Table::from_columns(cols.iter().map(|c| Column::Int64(c.to_vec())).collect()).unwrap()
    }

    fn df(root: RootContainer, blocks: &[u32], index: u32) -> ForwardMsg {
        ForwardMsg::new_element(
            make_delta_path(root, blocks, index),
            Element::Table(ints(&[&[0, 1, 2], &[10, 11, 12]])),
        )
    }

    fn add_rows(root: RootContainer, blocks: &[u32], index: u32) -> ForwardMsg {
        ForwardMsg::add_rows(
            make_delta_path(root, blocks, index),
            ints(&[&[3, 4, 5], &[13, 14, 15]]),
        )
    }

    fn merged_table() -> Table {
        ints(&[&[0, 1, 2, 3, 4, 5], &[10, 11, 12, 13, 14, 15]])
    }

    #[test]
    fn simple_enqueue() {
        let queue = ForwardQueue::new();
        assert!(queue.is_empty());

        queue.enqueue(new_run()).unwrap();
        assert!(!queue.is_empty());

        let flushed = queue.flush();
        assert!(queue.is_empty());
        assert_eq!(flushed, vec![new_run()]);
    }

    #[test]
    fn distinct_paths_keep_order() {
        let queue = ForwardQueue::new();
        queue.enqueue(new_run()).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 0, "text1")).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 1, "text2")).unwrap();

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 3);
        assert_eq!(flushed[1], text(RootContainer::Main, &[], 0, "text1"));
        assert_eq!(flushed[2], text(RootContainer::Main, &[], 1, "text2"));
    }

    #[test]
    fn replace_element_at_same_path() {
        let queue = ForwardQueue::new();
        queue.enqueue(new_run()).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 0, "text1")).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 0, "text2")).unwrap();

        let flushed = queue.flush();
        assert_eq!(
            flushed,
            vec![new_run(), text(RootContainer::Main, &[], 0, "text2")]
        );
    }

    #[test]
    fn replacement_keeps_first_position() {
        let queue = ForwardQueue::new();
        queue.enqueue(text(RootContainer::Main, &[], 0, "a")).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 1, "b")).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 0, "c")).unwrap();

        let bodies: Vec<_> = queue
            .flush()
            .iter()
            .filter_map(|m| m.element().and_then(Element::as_text).map(str::to_owned))
            .collect();
        assert_eq!(bodies, vec!["c", "b"]);
    }

    #[test]
    fn simple_add_rows() {
        let queue = ForwardQueue::new();
        queue.enqueue(new_run()).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 0, "text1")).unwrap();
        queue.enqueue(df(RootContainer::Main, &[], 1)).unwrap();
        queue.enqueue(add_rows(RootContainer::Main, &[], 1)).unwrap();

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 3);
        assert_eq!(flushed[1], text(RootContainer::Main, &[], 0, "text1"));
        assert_eq!(
            flushed[2].element().and_then(Element::as_table),
            Some(&merged_table())
        );
    }

    #[test]
    fn add_rows_rerun_resets_accumulation() {
        let queue = ForwardQueue::new();
        queue.enqueue(new_run()).unwrap();

        for _ in 0..2 {
            queue.enqueue(text(RootContainer::Main, &[], 0, "text1")).unwrap();
            queue.enqueue(df(RootContainer::Main, &[], 1)).unwrap();
            queue.enqueue(add_rows(RootContainer::Main, &[], 1)).unwrap();
        }

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 3);
        assert_eq!(
            flushed[2].element().and_then(Element::as_table),
            Some(&merged_table())
        );
    }

    #[test]
    fn multiple_containers_do_not_coalesce() {
        let queue = ForwardQueue::new();
        queue.enqueue(new_run()).unwrap();

        for (root, blocks) in [
            (RootContainer::Main, &[][..]),
            (RootContainer::Sidebar, &[0, 0, 1][..]),
        ] {
            queue.enqueue(text(root, blocks, 0, "text1")).unwrap();
            queue.enqueue(df(root, blocks, 1)).unwrap();
            queue.enqueue(add_rows(root, blocks, 1)).unwrap();
        }

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 5);
        for (idx, (root, blocks)) in [
            (1, (RootContainer::Main, &[][..])),
            (3, (RootContainer::Sidebar, &[0, 0, 1][..])),
        ] {
            assert_eq!(flushed[idx], text(root, blocks, 0, "text1"));
            assert_eq!(
                flushed[idx + 1].delta_path(),
                Some(&make_delta_path(root, blocks, 1))
            );
            assert_eq!(
                flushed[idx + 1].element().and_then(Element::as_table),
                Some(&merged_table())
            );
        }
    }

    #[test]
    fn shape_mismatch_is_reported_and_queue_unchanged() {
        let queue = ForwardQueue::new();
        queue.enqueue(df(RootContainer::Main, &[], 0)).unwrap();
        let before = queue.snapshot();

        let err = queue
            .enqueue(ForwardMsg::add_rows(
                make_delta_path(RootContainer::Main, &[], 0),
                ints(&[&[1]]),
            ))
            .unwrap_err();
        assert!(matches!(err, EnqueueError::ShapeMismatch { .. }));
        assert_eq!(err.path(), &make_delta_path(RootContainer::Main, &[], 0));
        assert_eq!(queue.snapshot(), before);
    }

    #[test]
    fn add_rows_onto_non_table_is_rejected() {
        let queue = ForwardQueue::new();
        queue.enqueue(text(RootContainer::Main, &[], 0, "not a table")).unwrap();

        let err = queue.enqueue(add_rows(RootContainer::Main, &[], 0)).unwrap_err();
        assert_eq!(
            err,
            EnqueueError::NotTabular {
                path: make_delta_path(RootContainer::Main, &[], 0)
            }
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn orphan_add_rows_passes_through_and_accumulates() {
        let queue = ForwardQueue::new();
        queue.enqueue(add_rows(RootContainer::Main, &[], 3)).unwrap();
        queue.enqueue(add_rows(RootContainer::Main, &[], 3)).unwrap();

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 1);
        match &flushed[0] {
            ForwardMsg::Delta {
                delta: Delta::AddRows(rows),
                ..
            } => assert_eq!(rows.num_rows(), 6),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn new_element_replaces_orphan_rows() {
        let queue = ForwardQueue::new();
        queue.enqueue(add_rows(RootContainer::Main, &[], 0)).unwrap();
        queue.enqueue(df(RootContainer::Main, &[], 0)).unwrap();
        queue.enqueue(add_rows(RootContainer::Main, &[], 0)).unwrap();

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 1);
        assert_eq!(
            flushed[0].element().and_then(Element::as_table),
            Some(&merged_table())
        );
    }

    #[test]
    fn block_replaces_element_at_same_slot() {
        let queue = ForwardQueue::new();
        queue.enqueue(text(RootContainer::Main, &[], 0, "placeholder")).unwrap();
        queue
            .enqueue(ForwardMsg::new_block(
                make_delta_path(RootContainer::Main, &[], 0),
                BlockKind::Horizontal,
            ))
            .unwrap();

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].type_name(), "NewBlock");
    }

    #[test]
    fn flush_resets_path_index() {
        let queue = ForwardQueue::new();
        queue.enqueue(text(RootContainer::Main, &[], 0, "a")).unwrap();
        let _ = queue.flush();

        queue.enqueue(text(RootContainer::Main, &[], 0, "b")).unwrap();
        queue.enqueue(text(RootContainer::Main, &[], 1, "c")).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn clear_discards_everything() {
        let queue = ForwardQueue::new();
        queue.enqueue(new_run()).unwrap();
        queue.enqueue(df(RootContainer::Main, &[], 0)).unwrap();
        queue.clear();
        assert!(queue.is_empty());

        // Rows after a clear have no base to fold into.
        queue.enqueue(add_rows(RootContainer::Main, &[], 0)).unwrap();
        assert_eq!(queue.snapshot()[0].type_name(), "AddRows");
    }

    #[test]
    fn concurrent_producers_are_serialized() {
        let queue = ForwardQueue::new().shared();
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        queue
                            .enqueue(text(RootContainer::Main, &[t], i % 10, "x"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 40);
    }
}
