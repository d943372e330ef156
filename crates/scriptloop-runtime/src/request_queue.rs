#![forbid(unsafe_code)]

//! Pending run requests with rerun coalescing.
//!
//! The queue is shared between the caller thread, which enqueues, and the
//! runner thread, which dequeues at checkpoints. Enqueue rules:
//!
//! | Incoming  | Queue already holds | Result                                    |
//! |-----------|---------------------|-------------------------------------------|
//! | `Rerun`   | a `Rerun`           | pending rerun takes the new data in place |
//! | `Rerun`   | no `Rerun`          | appended                                  |
//! | `Stop`    | anything            | appended                                  |
//! | `Shutdown`| anything            | queue replaced by the lone shutdown       |
//!
//! Nothing behind a shutdown is ever processed, so dropping it on arrival
//! is equivalent to jumping the shutdown to the head of the line.
//!
//! Once the runner exits, the queue is closed and further requests are
//! rejected. Closing happens under the same lock as the final empty check,
//! so a request is either seen by the runner or rejected, never lost.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::widgets::WidgetStates;

/// Inputs for one script execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerunData {
    /// Client widget values to apply before the run. `None` keeps the stored ones.
    pub widget_states: Option<WidgetStates>,
    /// Arguments visible to the script. `None` keeps the previous run's.
    pub argv: Option<Vec<String>>,
}

impl RerunData {
    #[must_use]
    pub fn new(widget_states: Option<WidgetStates>, argv: Option<Vec<String>>) -> Self {
        Self {
            widget_states,
            argv,
        }
    }

    #[must_use]
    pub fn with_widget_states(states: WidgetStates) -> Self {
        Self {
            widget_states: Some(states),
            argv: None,
        }
    }
}

/// A request addressed to the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptRequest {
    Rerun(RerunData),
    Stop,
    Shutdown,
}

impl ScriptRequest {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rerun(_) => "rerun",
            Self::Stop => "stop",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    requests: VecDeque<ScriptRequest>,
    closed: bool,
}

/// FIFO of [`ScriptRequest`]s with coalescing and blocking wait.
#[derive(Debug, Default)]
pub struct ScriptRequestQueue {
    pending: Mutex<Pending>,
    available: Condvar,
}

impl ScriptRequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request. Returns `false` if the queue was closed.
    pub fn enqueue(&self, request: ScriptRequest) -> bool {
        let mut guard = self.lock();
        if guard.closed {
            tracing::debug!(request = request.name(), "request rejected: runner has exited");
            return false;
        }
        let pending = &mut guard.requests;
        match request {
            ScriptRequest::Shutdown => {
                let dropped = pending.len();
                pending.clear();
                pending.push_back(ScriptRequest::Shutdown);
                tracing::debug!(dropped, "shutdown requested");
            }
            ScriptRequest::Rerun(data) => {
                let existing = pending.iter_mut().find_map(|r| match r {
                    ScriptRequest::Rerun(existing) => Some(existing),
                    _ => None,
                });
                match existing {
                    Some(existing) => {
                        *existing = data;
                        tracing::trace!("coalesced rerun into pending request");
                    }
                    None => pending.push_back(ScriptRequest::Rerun(data)),
                }
            }
            ScriptRequest::Stop => pending.push_back(ScriptRequest::Stop),
        }
        crate::debug_trace!("enqueue: pending={}", pending.len());
        self.available.notify_all();
        true
    }

    /// Take the next request without blocking.
    pub fn dequeue(&self) -> Option<ScriptRequest> {
        let request = self.lock().requests.pop_front();
        if let Some(request) = &request {
            crate::debug_trace!("dequeue: {}", request.name());
        }
        request
    }

    /// Take the next request, or close the queue if there is none.
    pub fn dequeue_or_close(&self) -> Option<ScriptRequest> {
        let mut pending = self.lock();
        let request = pending.requests.pop_front();
        if request.is_none() {
            pending.closed = true;
            crate::debug_trace!("queue closed while idle");
        }
        request
    }

    /// Reject every future request and drop pending ones.
    pub fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        pending.requests.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Block until a request is available and take it.
    pub fn wait_dequeue(&self) -> ScriptRequest {
        let mut pending = self.lock();
        loop {
            if let Some(request) = pending.requests.pop_front() {
                crate::debug_trace!("wait_dequeue: {}", request.name());
                return request;
            }
            pending = self
                .available
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block up to `timeout` for a request.
    ///
    /// Handles spurious wakeups by waiting out the remaining time.
    pub fn wait_dequeue_timeout(&self, timeout: Duration) -> Option<ScriptRequest> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.lock();
        loop {
            if let Some(request) = pending.requests.pop_front() {
                return Some(request);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _) = self
                .available
                .wait_timeout(pending, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            pending = guard;
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.lock().requests.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use scriptloop_core::{WidgetId, WidgetValue};

    use super::*;

    fn rerun(tag: i64) -> ScriptRequest {
        ScriptRequest::Rerun(RerunData::with_widget_states(
            WidgetStates::new().with(WidgetId::from_raw("tag"), WidgetValue::Int(tag)),
        ))
    }

    #[test]
    fn reruns_coalesce_last_wins() {
        let queue = ScriptRequestQueue::new();
        queue.enqueue(rerun(1));
        queue.enqueue(rerun(2));
        queue.enqueue(rerun(3));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue(), Some(rerun(3)));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn coalesced_rerun_keeps_its_position() {
        let queue = ScriptRequestQueue::new();
        queue.enqueue(rerun(1));
        queue.enqueue(ScriptRequest::Stop);
        queue.enqueue(rerun(2));
        assert_eq!(queue.dequeue(), Some(rerun(2)));
        assert_eq!(queue.dequeue(), Some(ScriptRequest::Stop));
        assert!(queue.is_empty());
    }

    #[test]
    fn shutdown_preempts_everything() {
        let queue = ScriptRequestQueue::new();
        queue.enqueue(rerun(1));
        queue.enqueue(ScriptRequest::Stop);
        queue.enqueue(ScriptRequest::Shutdown);
        assert_eq!(queue.dequeue(), Some(ScriptRequest::Shutdown));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn stops_are_not_coalesced() {
        let queue = ScriptRequestQueue::new();
        queue.enqueue(ScriptRequest::Stop);
        queue.enqueue(ScriptRequest::Stop);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn closed_queue_rejects_requests() {
        let queue = ScriptRequestQueue::new();
        assert_eq!(queue.dequeue_or_close(), None);
        assert!(queue.is_closed());
        assert!(!queue.enqueue(rerun(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn dequeue_or_close_stays_open_when_work_is_pending() {
        let queue = ScriptRequestQueue::new();
        assert!(queue.enqueue(ScriptRequest::Stop));
        assert_eq!(queue.dequeue_or_close(), Some(ScriptRequest::Stop));
        assert!(!queue.is_closed());
    }

    #[test]
    fn wait_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(ScriptRequestQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_dequeue())
        };
        thread::sleep(Duration::from_millis(20));
        queue.enqueue(ScriptRequest::Stop);
        assert_eq!(waiter.join().unwrap(), ScriptRequest::Stop);
    }

    #[test]
    fn wait_dequeue_timeout_expires_when_idle() {
        let queue = ScriptRequestQueue::new();
        let start = Instant::now();
        assert_eq!(queue.wait_dequeue_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
