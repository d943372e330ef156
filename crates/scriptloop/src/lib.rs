#![forbid(unsafe_code)]

//! scriptloop public facade crate.
//!
//! Re-exports the types most programs need from `scriptloop-core` and
//! `scriptloop-runtime`, plus a prelude and a one-shot [`run_once`] helper.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use scriptloop_core::{
    BlockKind, Column, ColumnType, DeltaPath, Element, EnqueueError, ForwardMsg, ForwardQueue,
    RootContainer, Table, WidgetId, WidgetKind, WidgetValue, make_delta_path,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use scriptloop_runtime::{
    ClientState, CompileError, Container, FileScript, FnScript, IdleBehavior, Report,
    RunnerConfig, RunnerEvent, RunnerEventKind, RunnerState, ScriptContext, ScriptError,
    ScriptResult, ScriptRunner, ScriptSource, Session, SessionError, Slot, WidgetSpec,
    WidgetStates,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for scriptloop programs.
#[derive(Debug)]
pub enum Error {
    /// Thread spawn or other I/O failure.
    Io(std::io::Error),
    /// A message was rejected by the forward queue.
    Enqueue(EnqueueError),
    /// Session request failed.
    #[cfg(feature = "runtime")]
    Session(SessionError),
    /// The runner thread panicked outside of script code.
    RunnerPanicked,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Enqueue(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Session(err) => write!(f, "{err}"),
            Self::RunnerPanicked => f.write_str("script runner thread panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Enqueue(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Session(err) => Some(err),
            Self::RunnerPanicked => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<EnqueueError> for Error {
    fn from(err: EnqueueError) -> Self {
        Self::Enqueue(err)
    }
}

#[cfg(feature = "runtime")]
impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Spawn(io) => Self::Io(io),
            other => Self::Session(other),
        }
    }
}

/// Standard result type for scriptloop APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Run `source` once with `widget_states` and return the reconciled output.
///
/// Blocks until the runner thread exits. Lifecycle events are not reported;
/// use a [`Session`] or [`ScriptRunner`] for that.
#[cfg(feature = "runtime")]
pub fn run_once(
    source: std::sync::Arc<dyn ScriptSource>,
    report: Report,
    widget_states: Option<WidgetStates>,
) -> Result<Vec<ForwardMsg>> {
    let queue = std::sync::Arc::new(ForwardQueue::new());
    let mut runner = ScriptRunner::new(
        source,
        report,
        queue.clone(),
        ClientState::default(),
        RunnerConfig::default(),
    );
    runner.enqueue_rerun(widget_states, None);
    runner.start()?;
    runner.join().map_err(|_| Error::RunnerPanicked)?;
    Ok(queue.flush())
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{Element, Error, ForwardMsg, ForwardQueue, Result, Table, WidgetValue};

    #[cfg(feature = "runtime")]
    pub use crate::{
        Container, FnScript, Report, RunnerConfig, ScriptContext, ScriptError, ScriptResult,
        ScriptRunner, Session, WidgetStates, run_once,
    };

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use scriptloop_core as core;
#[cfg(feature = "runtime")]
pub use scriptloop_runtime as runtime;

#[cfg(all(test, feature = "runtime"))]
mod tests {
    use std::sync::Arc;

    use super::prelude::*;

    #[test]
    fn run_once_returns_reconciled_output() {
        let script = FnScript::new(|ctx| {
            let slot = ctx.text("draft")?;
            ctx.replace(&slot, Element::text("final"))?;
            ctx.text("footer")?;
            Ok(())
        });
        let msgs = run_once(Arc::new(script), Report::new("doc.script", "run doc.script"), None)
            .unwrap();
        let texts: Vec<_> = msgs
            .iter()
            .filter_map(|m| m.element().and_then(Element::as_text))
            .collect();
        assert_eq!(texts, ["final", "footer"]);
    }

    #[test]
    fn session_spawn_errors_map_to_io() {
        let err: Error = crate::SessionError::Spawn(std::io::Error::other("no threads")).into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "no threads");
    }
}
