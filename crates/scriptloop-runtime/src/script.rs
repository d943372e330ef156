#![forbid(unsafe_code)]

//! Script sources and bodies.
//!
//! A [`ScriptSource`] is compiled at the start of every run, producing a
//! fresh [`ScriptBody`] that executes once against a
//! [`ScriptContext`](crate::ScriptContext). Recompiling per run means edits
//! to a file-backed script are picked up by the next rerun.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::ScriptContext;
use crate::error::{CompileError, ScriptResult};

/// Identity of the script a runner executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    script_path: PathBuf,
    command_line: String,
}

impl Report {
    #[must_use]
    pub fn new(script_path: impl Into<PathBuf>, command_line: impl Into<String>) -> Self {
        Self {
            script_path: script_path.into(),
            command_line: command_line.into(),
        }
    }

    #[must_use]
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    #[must_use]
    pub fn command_line(&self) -> &str {
        &self.command_line
    }
}

/// One execution of a script.
pub trait ScriptBody {
    fn run(&mut self, ctx: &mut ScriptContext) -> ScriptResult;
}

impl<F> ScriptBody for F
where
    F: FnMut(&mut ScriptContext) -> ScriptResult,
{
    fn run(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        self(ctx)
    }
}

/// Something that can be compiled into a [`ScriptBody`].
pub trait ScriptSource: Send + Sync {
    fn compile(&self, report: &Report) -> Result<Box<dyn ScriptBody>, CompileError>;
}

/// A script written as a Rust closure.
///
/// ```ignore
/// let script = FnScript::new(|ctx| {
///     ctx.text("hello")?;
///     Ok(())
/// });
/// ```
pub struct FnScript<F> {
    body: Arc<F>,
}

impl<F> FnScript<F>
where
    F: Fn(&mut ScriptContext) -> ScriptResult + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(body: F) -> Self {
        Self {
            body: Arc::new(body),
        }
    }
}

impl<F> fmt::Debug for FnScript<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScript").finish_non_exhaustive()
    }
}

impl<F> ScriptSource for FnScript<F>
where
    F: Fn(&mut ScriptContext) -> ScriptResult + Send + Sync + 'static,
{
    fn compile(&self, _report: &Report) -> Result<Box<dyn ScriptBody>, CompileError> {
        let body = Arc::clone(&self.body);
        Ok(Box::new(move |ctx: &mut ScriptContext| body(ctx)))
    }
}

/// Compiles the text of a file found at a [`Report`]'s script path.
pub type CompileFn =
    dyn Fn(&str, &Report) -> Result<Box<dyn ScriptBody>, CompileError> + Send + Sync;

/// A script read from disk on every run.
///
/// The file contents are passed to a caller-supplied compile function, so
/// any script language can sit on top of the run loop.
pub struct FileScript {
    compile: Box<CompileFn>,
}

impl FileScript {
    pub fn new<C>(compile: C) -> Self
    where
        C: Fn(&str, &Report) -> Result<Box<dyn ScriptBody>, CompileError> + Send + Sync + 'static,
    {
        Self {
            compile: Box::new(compile),
        }
    }
}

impl fmt::Debug for FileScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileScript").finish_non_exhaustive()
    }
}

impl ScriptSource for FileScript {
    fn compile(&self, report: &Report) -> Result<Box<dyn ScriptBody>, CompileError> {
        let path = report.script_path();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::from_io(path.to_path_buf(), e))?;
        tracing::trace!(path = %path.display(), bytes = text.len(), "read script");
        (self.compile)(&text, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_script_compiles_every_time() {
        let script = FnScript::new(|_ctx| Ok(()));
        let report = Report::new("inline", "inline");
        assert!(script.compile(&report).is_ok());
        assert!(script.compile(&report).is_ok());
    }

    #[test]
    fn file_script_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report::new(dir.path().join("absent.script"), "run absent.script");
        let script = FileScript::new(|_, _| Ok(Box::new(|_: &mut ScriptContext| -> ScriptResult { Ok(()) })));
        match script.compile(&report) {
            Err(CompileError::NotFound { path }) => assert_eq!(path, report.script_path()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected compile failure"),
        }
    }

    #[test]
    fn file_script_passes_text_to_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.script");
        std::fs::write(&path, "oops").unwrap();
        let script = FileScript::new(|text, _| Err(CompileError::syntax(format!("rejected {text}"))));
        match script.compile(&Report::new(&path, "run bad.script")) {
            Err(err) => assert_eq!(err.to_string(), "rejected oops"),
            Ok(_) => panic!("expected compile failure"),
        }
    }
}
