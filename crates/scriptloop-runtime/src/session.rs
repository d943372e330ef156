#![forbid(unsafe_code)]

//! One client's view of a script: a forward queue fed by successive runners.
//!
//! The session translates runner lifecycle events into renderer messages:
//!
//! | Runner event            | Messages enqueued                                   |
//! |-------------------------|-----------------------------------------------------|
//! | `ScriptStarted`         | queue cleared, `NewRun`, `SessionStatus(running)`   |
//! | `ScriptStoppedWithSuccess` | `ScriptFinished(Success)`, `SessionStatus(idle)` |
//! | `ScriptStoppedWithCompileError` | `SessionEvent`, `ScriptFinished(CompileError)`, `SessionStatus(idle)` |
//! | `Shutdown`              | none; widget values are kept for the next runner    |
//!
//! A runner with `IdleBehavior::Shutdown` exits once it runs out of work.
//! The next rerun request then spawns a fresh runner seeded with the widget
//! values the previous one reported on shutdown.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scriptloop_core::{
    ForwardMsg, ForwardQueue, RunMetadata, ScriptFinishedStatus, SessionEvent, SessionStatus,
};

use crate::config::RunnerConfig;
use crate::events::RunnerEvent;
use crate::script::{Report, ScriptSource};
use crate::script_runner::ScriptRunner;
use crate::widgets::{ClientState, WidgetStates};

/// Errors returned by [`Session`] requests.
#[derive(Debug)]
pub enum SessionError {
    /// [`Session::shutdown`] was already called.
    Closed,
    /// The runner thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("session is closed"),
            Self::Spawn(e) => write!(f, "failed to spawn script runner: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Closed => None,
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

/// Coarse state of a session as seen by its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Closed,
}

/// State written from runner threads through the event observer.
struct SessionShared {
    queue: Arc<ForwardQueue>,
    report: Report,
    state: Mutex<SessionState>,
    client_state: Mutex<ClientState>,
    runs: AtomicU64,
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != SessionState::Closed {
            *current = state;
        }
    }

    fn push(&self, msg: ForwardMsg) {
        let name = msg.type_name();
        if let Err(e) = self.queue.enqueue(msg) {
            tracing::warn!(msg = name, error = %e, "failed to enqueue session message");
        }
    }

    fn push_finished(&self, status: ScriptFinishedStatus) {
        self.push(ForwardMsg::ScriptFinished(status));
        self.push(ForwardMsg::SessionStatus(SessionStatus {
            script_is_running: false,
        }));
        self.set_state(SessionState::Idle);
    }

    fn on_event(&self, event: &RunnerEvent) {
        match event {
            RunnerEvent::ScriptStarted { argv, .. } => {
                let run_id = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
                self.queue.clear();
                self.push(ForwardMsg::NewRun(RunMetadata {
                    run_id,
                    script_path: self.report.script_path().display().to_string(),
                    command_line: self.report.command_line().to_owned(),
                    argv: argv.clone(),
                }));
                self.push(ForwardMsg::SessionStatus(SessionStatus {
                    script_is_running: true,
                }));
                self.set_state(SessionState::Running);
            }
            RunnerEvent::ScriptStoppedWithSuccess { .. } => {
                self.push_finished(ScriptFinishedStatus::Success);
            }
            RunnerEvent::ScriptStoppedWithCompileError { error, .. } => {
                self.push(ForwardMsg::SessionEvent(
                    SessionEvent::ScriptCompilationError {
                        message: error.to_string(),
                    },
                ));
                self.push_finished(ScriptFinishedStatus::CompileError);
            }
            RunnerEvent::Shutdown { client_state } => {
                *self
                    .client_state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = client_state.clone();
                self.set_state(SessionState::Idle);
            }
        }
    }
}

/// Wires a script source, a forward queue, and successive runners together.
pub struct Session {
    source: Arc<dyn ScriptSource>,
    config: RunnerConfig,
    shared: Arc<SessionShared>,
    runner: Mutex<Option<ScriptRunner>>,
    closed: AtomicBool,
}

impl Session {
    #[must_use]
    pub fn new(source: Arc<dyn ScriptSource>, report: Report, config: RunnerConfig) -> Self {
        Self::with_client_state(source, report, config, ClientState::default())
    }

    /// Start from widget values saved by an earlier session.
    #[must_use]
    pub fn with_client_state(
        source: Arc<dyn ScriptSource>,
        report: Report,
        config: RunnerConfig,
        client_state: ClientState,
    ) -> Self {
        Self {
            source,
            config,
            shared: Arc::new(SessionShared {
                queue: Arc::new(ForwardQueue::new()),
                report,
                state: Mutex::new(SessionState::Idle),
                client_state: Mutex::new(client_state),
                runs: AtomicU64::new(0),
            }),
            runner: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue renderer messages are written to.
    #[must_use]
    pub fn queue(&self) -> &Arc<ForwardQueue> {
        &self.shared.queue
    }

    /// Drain pending renderer messages.
    pub fn flush(&self) -> Vec<ForwardMsg> {
        self.shared.queue.flush()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of runs started across every runner of this session.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.shared.runs.load(Ordering::Relaxed)
    }

    /// Ask for a rerun, spawning a runner if none is alive.
    pub fn request_rerun(
        &self,
        widget_states: Option<WidgetStates>,
        argv: Option<Vec<String>>,
    ) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        let mut slot = self.lock_runner();
        if let Some(runner) = slot.as_ref()
            && runner.enqueue_rerun(widget_states.clone(), argv.clone())
        {
            return Ok(());
        }
        if let Some(mut previous) = slot.take()
            && previous.join().is_err()
        {
            tracing::warn!("previous script runner thread panicked");
        }

        let client_state = self
            .shared
            .client_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut runner = ScriptRunner::new(
            Arc::clone(&self.source),
            self.shared.report.clone(),
            self.shared.queue.clone(),
            client_state,
            self.config.clone(),
        );
        let shared = Arc::clone(&self.shared);
        runner.subscribe(move |event| shared.on_event(event));
        runner.enqueue_rerun(widget_states, argv);
        runner.start()?;
        tracing::debug!(
            script = %self.shared.report.script_path().display(),
            "spawned script runner"
        );
        *slot = Some(runner);
        Ok(())
    }

    /// Stop the current run, if any.
    pub fn request_stop(&self) {
        if let Some(runner) = self.lock_runner().as_ref() {
            runner.enqueue_stop();
        }
    }

    /// Shut the runner down, wait for it, and refuse further requests.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(mut runner) = self.lock_runner().take() {
            runner.enqueue_shutdown();
            if runner.join().is_err() {
                tracing::warn!("script runner thread panicked");
            }
        }
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = SessionState::Closed;
    }

    /// Widget values of the current runner, or the last ones a runner
    /// reported on shutdown.
    #[must_use]
    pub fn client_state(&self) -> ClientState {
        if let Some(runner) = self.lock_runner().as_ref() {
            return ClientState::new(runner.widget_states());
        }
        self.shared
            .client_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_runner(&self) -> MutexGuard<'_, Option<ScriptRunner>> {
        self.runner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("script_path", &self.shared.report.script_path())
            .field("state", &self.state())
            .field("queued", &self.shared.queue.len())
            .finish_non_exhaustive()
    }
}
