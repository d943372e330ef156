#![forbid(unsafe_code)]

//! The script run loop.
//!
//! A [`ScriptRunner`] owns one background thread that pulls requests from a
//! [`ScriptRequestQueue`] and executes the script for each rerun.
//!
//! # State machine
//!
//! ```text
//!  NotStarted ──start()──▶ Running ──run ends──▶ Stopped(outcome)
//!                            ▲                        │
//!                            └──── next rerun ────────┘
//!                                                     │ queue empty / shutdown
//!                                                     ▼
//!                                ShuttingDown ──▶ Terminated
//! ```
//!
//! # Events
//!
//! Every run emits `ScriptStarted` followed by exactly one of
//! `ScriptStoppedWithSuccess` or `ScriptStoppedWithCompileError`. The loop
//! emits `Shutdown` exactly once, last, carrying the final widget values.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Compile error | Missing file, rejected source | Compile-error event, no output |
//! | Runtime error | Script returned `Err(Runtime)` | Exception rendered, success event |
//! | Panic | Script panicked (`catch_panics` on) | Same as runtime error |
//! | Compile panic | Compile step panicked (`catch_panics` on) | Same as compile error |
//! | Uncaught panic | `catch_panics` off | Success event, `Shutdown`, thread exits |
//! | Observer panic | Callback panicked | Logged, loop continues |

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::{IdleBehavior, RunnerConfig};
use crate::context::ScriptContext;
use crate::error::{CompileError, Interrupt, RuntimeError, ScriptError};
use crate::events::{ObserverId, Observers, RunnerEvent};
use crate::request_queue::{RerunData, ScriptRequest, ScriptRequestQueue};
use crate::script::{Report, ScriptSource};
use crate::sink::MessageSink;
use crate::widgets::{ClientState, WidgetStates, WidgetStore};

/// How the most recent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Ran to completion.
    Completed,
    /// Cut short by a stop, rerun, or shutdown request.
    Interrupted,
    /// Failed at runtime; an exception was rendered.
    RuntimeError,
    /// Failed to compile; nothing was rendered.
    CompileError,
}

/// Lifecycle state of a [`ScriptRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    NotStarted,
    Running,
    Stopped(StopOutcome),
    ShuttingDown,
    Terminated,
}

impl RunnerState {
    /// `true` once the loop has begun exiting.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

/// Runs the loop's exit path even when a panic unwinds through it.
struct ExitGuard<'a>(&'a RunnerShared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// What the loop does after a run.
#[derive(Debug)]
enum AfterRun {
    Continue,
    Rerun(RerunData),
    Shutdown,
}

struct RunnerShared {
    source: Arc<dyn ScriptSource>,
    report: Arc<Report>,
    sink: Arc<dyn MessageSink>,
    requests: Arc<ScriptRequestQueue>,
    widgets: Arc<WidgetStore>,
    observers: Observers,
    state: Mutex<RunnerState>,
    argv: Mutex<Vec<String>>,
    run_counter: AtomicU64,
    config: RunnerConfig,
}

/// Executes a script on a background thread in response to requests.
///
/// ```ignore
/// let queue = Arc::new(ForwardQueue::new());
/// let mut runner = ScriptRunner::new(
///     Arc::new(FnScript::new(|ctx| { ctx.text("hi")?; Ok(()) })),
///     Report::new("hello.script", "run hello.script"),
///     queue.clone(),
///     ClientState::default(),
///     RunnerConfig::default(),
/// );
/// runner.enqueue_rerun(None, None);
/// runner.start()?;
/// runner.join();
/// ```
pub struct ScriptRunner {
    shared: Arc<RunnerShared>,
    thread: Option<JoinHandle<()>>,
    started: bool,
}

impl ScriptRunner {
    #[must_use]
    pub fn new(
        source: Arc<dyn ScriptSource>,
        report: Report,
        sink: Arc<dyn MessageSink>,
        client_state: ClientState,
        config: RunnerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(RunnerShared {
                source,
                report: Arc::new(report),
                sink,
                requests: Arc::new(ScriptRequestQueue::new()),
                widgets: Arc::new(WidgetStore::from_client_state(client_state)),
                observers: Observers::default(),
                state: Mutex::new(RunnerState::NotStarted),
                argv: Mutex::new(Vec::new()),
                run_counter: AtomicU64::new(0),
                config,
            }),
            thread: None,
            started: false,
        }
    }

    /// Spawn the runner thread.
    ///
    /// A runner starts at most once; later calls do nothing, even after
    /// [`join`](Self::join).
    pub fn start(&mut self) -> io::Result<()> {
        if self.started {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || shared.run_loop())?;
        self.thread = Some(handle);
        self.started = true;
        Ok(())
    }

    /// Ask for a run with fresh widget values and arguments.
    ///
    /// Returns `false` if the runner has already exited.
    pub fn enqueue_rerun(
        &self,
        widget_states: Option<WidgetStates>,
        argv: Option<Vec<String>>,
    ) -> bool {
        self.enqueue(ScriptRequest::Rerun(RerunData::new(widget_states, argv)))
    }

    /// Interrupt the current run at its next checkpoint.
    pub fn enqueue_stop(&self) -> bool {
        self.enqueue(ScriptRequest::Stop)
    }

    /// Make the loop exit at its next checkpoint.
    pub fn enqueue_shutdown(&self) -> bool {
        self.enqueue(ScriptRequest::Shutdown)
    }

    pub fn enqueue(&self, request: ScriptRequest) -> bool {
        self.shared.requests.enqueue(request)
    }

    /// Register a callback for lifecycle events. It runs on the runner thread.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&RunnerEvent) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(Arc::new(observer))
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.shared.state()
    }

    /// Current widget values, triggers included.
    #[must_use]
    pub fn widget_states(&self) -> WidgetStates {
        self.shared.widgets.snapshot()
    }

    #[must_use]
    pub fn report(&self) -> &Report {
        &self.shared.report
    }

    /// Whether the thread has been spawned and has not yet returned.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the runner thread to exit.
    ///
    /// Returns immediately if the runner was never started.
    pub fn join(&mut self) -> thread::Result<()> {
        match self.thread.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl Drop for ScriptRunner {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shared.requests.enqueue(ScriptRequest::Shutdown);
        }
        // Don't join in drop to avoid blocking
    }
}

impl std::fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("script_path", &self.shared.report.script_path())
            .field("state", &self.state())
            .field("started", &self.started)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner thread
// ─────────────────────────────────────────────────────────────────────────────

impl RunnerShared {
    fn state(&self) -> RunnerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RunnerState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        crate::debug_trace!("state: {:?} -> {:?}", *current, state);
        *current = state;
    }

    fn next_request(&self) -> Option<ScriptRequest> {
        match self.config.idle {
            IdleBehavior::Shutdown => self.requests.dequeue_or_close(),
            IdleBehavior::Wait => Some(self.requests.wait_dequeue()),
        }
    }

    fn run_loop(&self) {
        tracing::debug!(
            script = %self.report.script_path().display(),
            idle = ?self.config.idle,
            "script runner started"
        );
        let _exit = ExitGuard(self);
        while let Some(request) = self.next_request() {
            match request {
                ScriptRequest::Stop => tracing::trace!("stop request while idle ignored"),
                ScriptRequest::Shutdown => break,
                ScriptRequest::Rerun(data) => {
                    if matches!(self.run_until_settled(data), AfterRun::Shutdown) {
                        break;
                    }
                }
            }
        }
    }

    /// Leave the loop: refuse new requests, close out a run a panic cut
    /// short, then report `Shutdown`.
    fn finish(&self) {
        self.requests.close();
        if thread::panicking() && self.state() == RunnerState::Running {
            let run_id = self.run_counter.load(Ordering::Relaxed);
            tracing::warn!(run_id, "script panicked with catch_panics off; runner exiting");
            self.widgets.reset_triggers();
            self.set_state(RunnerState::Stopped(StopOutcome::RuntimeError));
            self.observers
                .notify(&RunnerEvent::ScriptStoppedWithSuccess { run_id });
        }
        self.set_state(RunnerState::ShuttingDown);
        let client_state = ClientState::new(self.widgets.snapshot());
        tracing::debug!(widgets = client_state.widget_states.len(), "script runner shutting down");
        self.observers.notify(&RunnerEvent::Shutdown { client_state });
        self.set_state(RunnerState::Terminated);
    }

    /// Run, restarting immediately for every rerun that interrupts a run.
    fn run_until_settled(&self, mut data: RerunData) -> AfterRun {
        loop {
            match self.run_script(data) {
                AfterRun::Rerun(next) => data = next,
                other => return other,
            }
        }
    }

    fn run_script(&self, data: RerunData) -> AfterRun {
        let run_id = self.run_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let _span = tracing::info_span!(
            "scriptloop.run",
            run_id,
            script = %self.report.script_path().display()
        )
        .entered();

        let argv = {
            let mut argv = self.argv.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(new_argv) = data.argv {
                *argv = new_argv;
            }
            argv.clone()
        };

        self.set_state(RunnerState::Running);
        self.observers.notify(&RunnerEvent::ScriptStarted {
            run_id,
            argv: argv.clone(),
        });

        if let Some(states) = data.widget_states {
            self.widgets.set_values(states);
        }

        let compiled = if self.config.catch_panics {
            catch_unwind(AssertUnwindSafe(|| self.source.compile(&self.report)))
                .unwrap_or_else(|payload| Err(CompileError::from_panic(&*payload)))
        } else {
            self.source.compile(&self.report)
        };
        let mut body = match compiled {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(run_id, %error, "script failed to compile");
                self.widgets.reset_triggers();
                self.set_state(RunnerState::Stopped(StopOutcome::CompileError));
                self.observers
                    .notify(&RunnerEvent::ScriptStoppedWithCompileError { run_id, error });
                return AfterRun::Continue;
            }
        };

        let mut ctx = ScriptContext::new(
            run_id,
            Arc::clone(&self.report),
            argv,
            Arc::clone(&self.sink),
            Arc::clone(&self.requests),
            Arc::clone(&self.widgets),
        );

        let result = if self.config.catch_panics {
            catch_unwind(AssertUnwindSafe(|| body.run(&mut ctx))).unwrap_or_else(|payload| {
                Err(ScriptError::Runtime(RuntimeError::from_panic(&*payload)))
            })
        } else {
            body.run(&mut ctx)
        };

        let (outcome, after) = match result {
            Ok(()) => (StopOutcome::Completed, AfterRun::Continue),
            Err(ScriptError::Interrupted(Interrupt::Stop)) => {
                (StopOutcome::Interrupted, AfterRun::Continue)
            }
            Err(ScriptError::Interrupted(Interrupt::Rerun(next))) => {
                (StopOutcome::Interrupted, AfterRun::Rerun(next))
            }
            Err(ScriptError::Interrupted(Interrupt::Shutdown)) => {
                (StopOutcome::Interrupted, AfterRun::Shutdown)
            }
            Err(ScriptError::Runtime(error)) => {
                tracing::debug!(run_id, %error, "script raised a runtime error");
                ctx.render_exception(&error);
                (StopOutcome::RuntimeError, AfterRun::Continue)
            }
        };

        tracing::debug!(run_id, ?outcome, emitted = ctx.emitted(), "script run finished");
        self.widgets.reset_triggers();
        self.set_state(RunnerState::Stopped(outcome));
        self.observers
            .notify(&RunnerEvent::ScriptStoppedWithSuccess { run_id });
        after
    }
}
