#![forbid(unsafe_code)]

//! Runtime: executes scripts on a background thread and reruns them on
//! request.
//!
//! # Key Components
//!
//! - [`ScriptRunner`] - Owns the runner thread and its lifecycle state machine
//! - [`ScriptRequestQueue`] - Pending rerun/stop/shutdown requests, with coalescing
//! - [`ScriptContext`] - Per-run handle scripts emit output through
//! - [`WidgetStore`] - Widget values carried across reruns
//! - [`Session`] - One client's forward queue fed by successive runners
//!
//! # How it works
//!
//! 1. A caller enqueues a rerun with fresh widget values
//! 2. The runner compiles the script and executes it against a [`ScriptContext`]
//! 3. Every emitted element goes to the sink, then the context checkpoints
//! 4. A pending request at a checkpoint ends the run via `Err(Interrupted)`

pub mod config;
pub mod context;
pub mod cursor;
pub mod debug_trace;
pub mod error;
pub mod events;
pub mod request_queue;
pub mod script;
pub mod script_runner;
pub mod session;
pub mod sink;
pub mod widgets;

pub use config::{IdleBehavior, RunnerConfig};
pub use context::{ScriptContext, WidgetSpec};
pub use cursor::{Container, Slot};
pub use error::{CompileError, Interrupt, RuntimeError, ScriptError, ScriptResult};
pub use events::{ObserverId, RunnerEvent, RunnerEventKind};
pub use request_queue::{RerunData, ScriptRequest, ScriptRequestQueue};
pub use script::{CompileFn, FileScript, FnScript, Report, ScriptBody, ScriptSource};
pub use script_runner::{RunnerState, ScriptRunner, StopOutcome};
pub use session::{Session, SessionError, SessionState};
pub use sink::MessageSink;
pub use widgets::{ClientState, WidgetStates, WidgetStore};
