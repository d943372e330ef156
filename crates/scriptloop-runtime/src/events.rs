#![forbid(unsafe_code)]

//! Lifecycle events reported by the runner.
//!
//! Observers are called synchronously on the runner thread, in subscription
//! order. A panicking observer is logged and skipped; it never takes the run
//! loop down with it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::CompileError;
use crate::widgets::ClientState;

/// Something that happened to the runner.
#[derive(Debug)]
pub enum RunnerEvent {
    /// A run is about to execute. Emitted before compilation.
    ScriptStarted { run_id: u64, argv: Vec<String> },
    /// The run ended normally, by stop or rerun interrupt, or by a runtime
    /// error that was rendered as an exception.
    ScriptStoppedWithSuccess { run_id: u64 },
    /// The script could not be compiled; nothing was emitted.
    ScriptStoppedWithCompileError { run_id: u64, error: CompileError },
    /// The run loop has exited. Always the last event.
    Shutdown { client_state: ClientState },
}

/// Discriminant of a [`RunnerEvent`], handy for recording event order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerEventKind {
    ScriptStarted,
    ScriptStoppedWithSuccess,
    ScriptStoppedWithCompileError,
    Shutdown,
}

impl RunnerEvent {
    #[must_use]
    pub fn kind(&self) -> RunnerEventKind {
        match self {
            Self::ScriptStarted { .. } => RunnerEventKind::ScriptStarted,
            Self::ScriptStoppedWithSuccess { .. } => RunnerEventKind::ScriptStoppedWithSuccess,
            Self::ScriptStoppedWithCompileError { .. } => {
                RunnerEventKind::ScriptStoppedWithCompileError
            }
            Self::Shutdown { .. } => RunnerEventKind::Shutdown,
        }
    }
}

impl fmt::Display for RunnerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ScriptStarted => "SCRIPT_STARTED",
            Self::ScriptStoppedWithSuccess => "SCRIPT_STOPPED_WITH_SUCCESS",
            Self::ScriptStoppedWithCompileError => "SCRIPT_STOPPED_WITH_COMPILE_ERROR",
            Self::Shutdown => "SHUTDOWN",
        })
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
pub type ObserverId = u64;

type Observer = Arc<dyn Fn(&RunnerEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    list: Mutex<Vec<(ObserverId, Observer)>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, observer: Observer) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut list = self.list.lock().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Call every observer with `event`.
    ///
    /// The list is snapshotted first, so observers may subscribe or
    /// unsubscribe from inside a callback.
    pub(crate) fn notify(&self, event: &RunnerEvent) {
        let snapshot: Vec<Observer> = self
            .list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        crate::debug_trace!("notify: {} observers={}", event.kind(), snapshot.len());
        for observer in snapshot {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::warn!(event = %event.kind(), "runner event observer panicked");
            }
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.list.lock().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("Observers").field("count", &count).finish()
    }
}
