#![forbid(unsafe_code)]

//! Error types for compiling and running scripts.

use std::any::Any;
use std::fmt;
use std::io;
use std::path::PathBuf;

use scriptloop_core::{EnqueueError, ExceptionInfo};

use crate::request_queue::RerunData;

// ─────────────────────────────────────────────────────────────────────────────
// Compile errors
// ─────────────────────────────────────────────────────────────────────────────

/// A script could not be turned into a runnable body.
///
/// Reported through the compile-error event; no output is produced for the
/// run.
#[derive(Debug)]
pub enum CompileError {
    /// The script file does not exist.
    NotFound { path: PathBuf },
    /// The script file exists but could not be read.
    Io { path: PathBuf, source: io::Error },
    /// The script source was rejected.
    Syntax { message: String, line: Option<usize> },
    /// The compile step panicked.
    Panicked { message: String },
}

impl CompileError {
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            line: None,
        }
    }

    #[must_use]
    pub fn syntax_at(message: impl Into<String>, line: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line: Some(line),
        }
    }

    /// Build from a panic payload caught around the compile step.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panicked {
            message: panic_message(payload),
        }
    }

    /// Map a read failure for `path`, singling out a missing file.
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "script not found: {}", path.display()),
            Self::Io { path, source } => {
                write!(f, "failed to read script {}: {source}", path.display())
            }
            Self::Syntax {
                message,
                line: Some(line),
            } => write!(f, "line {line}: {message}"),
            Self::Syntax {
                message,
                line: None,
            } => f.write_str(message),
            Self::Panicked { message } => write!(f, "script compiler panicked: {message}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime errors
// ─────────────────────────────────────────────────────────────────────────────

/// A script body failed while running.
///
/// Rendered as an exception element; the run still ends with the success
/// event because the runner itself is healthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    kind: String,
    message: String,
    stack: Vec<String>,
}

impl RuntimeError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "RuntimeError".to_owned(),
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Build from any error, keeping its source chain as stack lines.
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut stack = Vec::new();
        let mut source = error.source();
        while let Some(inner) = source {
            stack.push(inner.to_string());
            source = inner.source();
        }
        Self {
            kind: "Error".to_owned(),
            message: error.to_string(),
            stack,
        }
    }

    /// Build from a panic payload caught with `catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self {
            kind: "Panic".to_owned(),
            message: panic_message(payload),
            stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Append a context line, outermost last.
    #[must_use]
    pub fn with_context(mut self, line: impl Into<String>) -> Self {
        self.stack.push(line.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    #[must_use]
    pub fn to_exception(&self) -> ExceptionInfo {
        ExceptionInfo {
            kind: self.kind.clone(),
            message: self.message.clone(),
            stack: self.stack.clone(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

// ─────────────────────────────────────────────────────────────────────────────
// Script errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why a checkpoint cut a run short.
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    Stop,
    Shutdown,
    /// A newer rerun arrived; the run restarts with this data.
    Rerun(RerunData),
}

/// Error returned from a script body.
///
/// Scripts must propagate these with `?`: swallowing an
/// [`Interrupted`](Self::Interrupted) error keeps a stopped run going.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    Interrupted(Interrupt),
    Runtime(RuntimeError),
}

impl ScriptError {
    /// Shorthand for a plain runtime error.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(RuntimeError::new(message))
    }

    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted(Interrupt::Stop) => f.write_str("run stopped"),
            Self::Interrupted(Interrupt::Shutdown) => f.write_str("runner shutting down"),
            Self::Interrupted(Interrupt::Rerun(_)) => f.write_str("rerun requested"),
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Runtime(e) => Some(e),
            Self::Interrupted(_) => None,
        }
    }
}

impl From<RuntimeError> for ScriptError {
    fn from(e: RuntimeError) -> Self {
        Self::Runtime(e)
    }
}

impl From<Interrupt> for ScriptError {
    fn from(interrupt: Interrupt) -> Self {
        Self::Interrupted(interrupt)
    }
}

impl From<EnqueueError> for ScriptError {
    fn from(e: EnqueueError) -> Self {
        Self::Runtime(RuntimeError::from_error(&e).with_kind("EnqueueError"))
    }
}

/// Result type of script bodies and context calls.
pub type ScriptResult<T = ()> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = CompileError::from_io(
            PathBuf::from("gone.script"),
            io::Error::new(io::ErrorKind::NotFound, "nope"),
        );
        assert!(matches!(err, CompileError::NotFound { .. }));
        assert_eq!(err.to_string(), "script not found: gone.script");
    }

    #[test]
    fn other_io_keeps_source() {
        let err = CompileError::from_io(
            PathBuf::from("locked.script"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn syntax_display_includes_line() {
        assert_eq!(CompileError::syntax_at("bad token", 3).to_string(), "line 3: bad token");
        assert_eq!(CompileError::syntax("bad").to_string(), "bad");
    }

    #[test]
    fn panic_payloads_are_recovered() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(RuntimeError::from_panic(s.as_ref()).message(), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let err = RuntimeError::from_panic(owned.as_ref());
        assert_eq!(err.kind(), "Panic");
        assert_eq!(err.message(), "owned boom");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(RuntimeError::from_panic(other.as_ref()).message(), "unknown panic");
    }

    #[test]
    fn compile_panic_keeps_message() {
        let payload: Box<dyn Any + Send> = Box::new("parser blew up");
        assert_eq!(
            CompileError::from_panic(payload.as_ref()).to_string(),
            "script compiler panicked: parser blew up"
        );
    }

    #[test]
    fn from_error_walks_sources() {
        let err = CompileError::from_io(
            PathBuf::from("x"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let runtime = RuntimeError::from_error(&err);
        assert_eq!(runtime.stack(), ["denied"]);
        assert_eq!(runtime.to_exception().kind, "Error");
    }
}
