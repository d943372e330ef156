#![forbid(unsafe_code)]

//! Destination for messages produced by a running script.

use scriptloop_core::{EnqueueError, ForwardMsg, ForwardQueue};

/// Receives every message a script emits, in emission order.
///
/// Implemented for [`ForwardQueue`] and for plain closures, so tests and
/// sessions can observe or forward output without a wrapper type.
pub trait MessageSink: Send + Sync {
    fn send(&self, msg: ForwardMsg) -> Result<(), EnqueueError>;
}

impl MessageSink for ForwardQueue {
    fn send(&self, msg: ForwardMsg) -> Result<(), EnqueueError> {
        self.enqueue(msg)
    }
}

impl<F> MessageSink for F
where
    F: Fn(ForwardMsg) -> Result<(), EnqueueError> + Send + Sync,
{
    fn send(&self, msg: ForwardMsg) -> Result<(), EnqueueError> {
        self(msg)
    }
}
