//! Property-based invariant tests for the forward queue.
//!
//! 1. At most one queued entry per distinct delta path.
//! 2. Distinct paths appear in order of their first enqueue.
//! 3. The last element written to a path is the one flushed.
//! 4. Pathless messages keep their absolute arrival order.
//! 5. Appending rows in several calls equals appending them in one call.

use std::collections::HashMap;

use proptest::prelude::*;
use scriptloop_core::{
    Column, Element, ForwardMsg, ForwardQueue, RootContainer, SessionStatus, Table,
    make_delta_path,
};

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Text { sidebar: bool, block: Vec<u32>, index: u32, body: u16 },
    Status(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<bool>(), prop::collection::vec(0u32..2, 0..2), 0u32..4, any::<u16>())
            .prop_map(|(sidebar, block, index, body)| Op::Text { sidebar, block, index, body }),
        1 => any::<bool>().prop_map(Op::Status),
    ]
}

fn to_msg(op: &Op) -> ForwardMsg {
    match op {
        Op::Text {
            sidebar,
            block,
            index,
            body,
        } => {
            let root = if *sidebar {
                RootContainer::Sidebar
            } else {
                RootContainer::Main
            };
            ForwardMsg::new_element(
                make_delta_path(root, block, *index),
                Element::text(body.to_string()),
            )
        }
        Op::Status(running) => ForwardMsg::SessionStatus(SessionStatus {
            script_is_running: *running,
        }),
    }
}

fn int_rows(rows: &[(i64, i64)]) -> Table {
    Table::from_columns(vec![
        Column::Int64(rows.iter().map(|r| r.0).collect()),
        Column::Int64(rows.iter().map(|r| r.1).collect()),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn one_entry_per_path_in_first_seen_order(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let queue = ForwardQueue::new();
        for op in &ops {
            queue.enqueue(to_msg(op)).unwrap();
        }
        let flushed = queue.flush();

        // Expected model: first-seen order for paths, last write wins.
        let mut order = Vec::new();
        let mut latest = HashMap::new();
        let mut statuses = Vec::new();
        for msg in ops.iter().map(to_msg) {
            match msg.delta_path().cloned() {
                Some(path) => {
                    if !latest.contains_key(&path) {
                        order.push(path.clone());
                    }
                    latest.insert(path, msg);
                }
                None => statuses.push(msg),
            }
        }

        let flushed_paths: Vec<_> = flushed.iter().filter_map(|m| m.delta_path().cloned()).collect();
        prop_assert_eq!(&flushed_paths, &order);

        for msg in flushed.iter().filter(|m| m.is_delta()) {
            let path = msg.delta_path().unwrap();
            prop_assert_eq!(Some(msg), latest.get(path));
        }

        let flushed_statuses: Vec<_> = flushed.iter().filter(|m| !m.is_delta()).cloned().collect();
        prop_assert_eq!(flushed_statuses, statuses);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn append_rows_is_associative(
        base in prop::collection::vec((any::<i64>(), any::<i64>()), 0..8),
        chunks in prop::collection::vec(prop::collection::vec((any::<i64>(), any::<i64>()), 0..6), 1..5),
    ) {
        let path = make_delta_path(RootContainer::Main, &[], 1);

        let piecewise = ForwardQueue::new();
        piecewise.enqueue(ForwardMsg::new_element(path.clone(), Element::Table(int_rows(&base)))).unwrap();
        for chunk in &chunks {
            piecewise.enqueue(ForwardMsg::add_rows(path.clone(), int_rows(chunk))).unwrap();
        }

        let all: Vec<_> = chunks.iter().flatten().copied().collect();
        let at_once = ForwardQueue::new();
        at_once.enqueue(ForwardMsg::new_element(path.clone(), Element::Table(int_rows(&base)))).unwrap();
        at_once.enqueue(ForwardMsg::add_rows(path, int_rows(&all))).unwrap();

        let expected: Vec<_> = base.iter().chain(all.iter()).copied().collect();
        let piecewise = piecewise.flush();
        prop_assert_eq!(&piecewise, &at_once.flush());
        prop_assert_eq!(piecewise[0].element().and_then(Element::as_table), Some(&int_rows(&expected)));
    }
}
