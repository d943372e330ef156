#![forbid(unsafe_code)]

//! Widget state carried between runs.
//!
//! # Design Invariants
//!
//! 1. **Persistent values survive reruns**: checkbox, text, radio, and slider
//!    values stay in the store until overwritten by a client snapshot.
//! 2. **Triggers fire once**: a `Trigger(true)` value reads as `true` at most
//!    once, and every trigger is reset to `false` when a run ends.
//! 3. **Client order is kept**: snapshots iterate in the order ids were first
//!    inserted.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Poisoned lock | Panic while holding the store lock | Inner data is used as-is |
//! | Unknown id | Widget not seen by the client yet | Caller's default is used |

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use scriptloop_core::{WidgetId, WidgetValue};

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// Widget values as reported by a client, keyed by widget id.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct WidgetStates {
    values: IndexMap<WidgetId, WidgetValue>,
}

impl WidgetStates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, id: impl Into<WidgetId>, value: WidgetValue) -> Self {
        self.insert(id, value);
        self
    }

    /// Set the value for `id`, returning the previous one.
    pub fn insert(&mut self, id: impl Into<WidgetId>, value: WidgetValue) -> Option<WidgetValue> {
        self.values.insert(id.into(), value)
    }

    #[must_use]
    pub fn get(&self, id: &WidgetId) -> Option<&WidgetValue> {
        self.values.get(id)
    }

    pub fn remove(&mut self, id: &WidgetId) -> Option<WidgetValue> {
        self.values.shift_remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WidgetId, &WidgetValue)> {
        self.values.iter()
    }
}

impl FromIterator<(WidgetId, WidgetValue)> for WidgetStates {
    fn from_iter<I: IntoIterator<Item = (WidgetId, WidgetValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for WidgetStates {
    type Item = (WidgetId, WidgetValue);
    type IntoIter = indexmap::map::IntoIter<WidgetId, WidgetValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// State a session hands back when its runner shuts down, so the next runner
/// starts from where the last one stopped.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientState {
    pub widget_states: WidgetStates,
}

impl ClientState {
    #[must_use]
    pub fn new(widget_states: WidgetStates) -> Self {
        Self { widget_states }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Live widget values read by a running script.
///
/// Written from the caller thread (via rerun snapshots applied at run start)
/// and read from the runner thread, so access goes through a lock.
#[derive(Debug, Default)]
pub struct WidgetStore {
    values: RwLock<IndexMap<WidgetId, WidgetValue>>,
}

impl WidgetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from previously saved client state.
    #[must_use]
    pub fn from_client_state(state: ClientState) -> Self {
        Self {
            values: RwLock::new(state.widget_states.values),
        }
    }

    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Overwrite stored values with everything in `states`.
    ///
    /// Ids absent from `states` keep their current value.
    pub fn set_values(&self, states: WidgetStates) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let count = states.len();
        for (id, value) in states {
            values.insert(id, value);
        }
        tracing::trace!(count, total = values.len(), "applied widget states");
    }

    /// Read the value of `id`.
    ///
    /// A set trigger is cleared by this read, so a second read in the same
    /// run sees `Trigger(false)`.
    pub fn get_value(&self, id: &WidgetId) -> Option<WidgetValue> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let value = values.get_mut(id)?;
        match value {
            WidgetValue::Trigger(fired) => Some(WidgetValue::Trigger(std::mem::take(fired))),
            other => Some(other.clone()),
        }
    }

    /// Clear every trigger. Called at the end of each run.
    pub fn reset_triggers(&self) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        for value in values.values_mut() {
            if let WidgetValue::Trigger(fired) = value {
                *fired = false;
            }
        }
    }

    /// Copy of every stored value, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> WidgetStates {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        WidgetStates {
            values: values.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> WidgetId {
        WidgetId::from_raw(raw)
    }

    #[test]
    fn persistent_values_overwrite_unconditionally() {
        let store = WidgetStore::new();
        store.set_values(WidgetStates::new().with(id("a"), WidgetValue::Bool(false)));
        store.set_values(WidgetStates::new().with(id("a"), WidgetValue::Bool(true)));
        assert_eq!(store.get_value(&id("a")), Some(WidgetValue::Bool(true)));
        assert_eq!(store.get_value(&id("a")), Some(WidgetValue::Bool(true)));
    }

    #[test]
    fn absent_ids_keep_previous_values() {
        let store = WidgetStore::new();
        store.set_values(
            WidgetStates::new()
                .with(id("a"), WidgetValue::Int(1))
                .with(id("b"), WidgetValue::String("x".into())),
        );
        store.set_values(WidgetStates::new().with(id("a"), WidgetValue::Int(2)));
        assert_eq!(store.get_value(&id("b")), Some(WidgetValue::String("x".into())));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn trigger_reads_true_once() {
        let store = WidgetStore::new();
        store.set_values(WidgetStates::new().with(id("go"), WidgetValue::Trigger(true)));
        assert_eq!(store.get_value(&id("go")), Some(WidgetValue::Trigger(true)));
        assert_eq!(store.get_value(&id("go")), Some(WidgetValue::Trigger(false)));
    }

    #[test]
    fn reset_clears_unread_triggers() {
        let store = WidgetStore::new();
        store.set_values(
            WidgetStates::new()
                .with(id("go"), WidgetValue::Trigger(true))
                .with(id("keep"), WidgetValue::Bool(true)),
        );
        store.reset_triggers();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.get(&id("go")), Some(&WidgetValue::Trigger(false)));
        assert_eq!(snapshot.get(&id("keep")), Some(&WidgetValue::Bool(true)));
    }

    #[test]
    fn unknown_id_reads_none() {
        assert_eq!(WidgetStore::new().get_value(&id("nope")), None);
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let store = WidgetStore::new();
        store.set_values(
            WidgetStates::new()
                .with(id("z"), WidgetValue::Int(0))
                .with(id("a"), WidgetValue::Int(1))
                .with(id("m"), WidgetValue::Int(2)),
        );
        let order: Vec<_> = store
            .snapshot()
            .iter()
            .map(|(k, _)| k.as_str().to_owned())
            .collect();
        assert_eq!(order, ["z", "a", "m"]);
    }

    #[test]
    fn client_state_seeds_store() {
        let state = ClientState::new(WidgetStates::new().with(id("a"), WidgetValue::Float(0.5)));
        let store = WidgetStore::from_client_state(state.clone());
        assert_eq!(store.snapshot(), state.widget_states);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn widget_states_serialize_as_a_map() {
        let states = WidgetStates::new().with(id("checkbox-a"), WidgetValue::Bool(true));
        let json = serde_json::to_string(&states).unwrap();
        let back: WidgetStates = serde_json::from_str(&json).unwrap();
        assert_eq!(back, states);
    }
}
