#![forbid(unsafe_code)]

//! The handle a running script writes output through.
//!
//! Every emission allocates (or reuses) a slot, hands the message to the
//! sink, and then runs a checkpoint. The checkpoint is where queued stop,
//! shutdown, and rerun requests cut a run short, so a script only observes
//! interrupts as an `Err` from one of these calls.
//!
//! # Widget values
//!
//! | Stored value                 | Value the script sees          |
//! |------------------------------|--------------------------------|
//! | none                         | declared default               |
//! | same shape as the default    | stored value                   |
//! | different shape              | declared default (logged)      |
//! | radio index out of range     | declared default               |
//! | slider value outside bounds  | clamped into bounds            |

use std::collections::HashSet;
use std::mem::discriminant;
use std::path::Path;
use std::sync::Arc;

use scriptloop_core::{
    BlockKind, Element, ForwardMsg, Table, WidgetElement, WidgetId, WidgetKind, WidgetValue,
};

use crate::cursor::{Container, Cursors, Slot};
use crate::error::{Interrupt, RuntimeError, ScriptError, ScriptResult};
use crate::request_queue::{ScriptRequest, ScriptRequestQueue};
use crate::script::Report;
use crate::sink::MessageSink;
use crate::widgets::WidgetStore;

/// Declaration of one widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSpec {
    pub kind: WidgetKind,
    pub label: String,
    /// Explicit identity; set this to tell apart widgets with equal labels.
    pub key: Option<String>,
    pub default: WidgetValue,
    pub options: Vec<String>,
    /// Inclusive bounds for numeric widgets.
    pub range: Option<(f64, f64)>,
}

impl WidgetSpec {
    #[must_use]
    pub fn new(kind: WidgetKind, label: impl Into<String>, default: WidgetValue) -> Self {
        Self {
            kind,
            label: label.into(),
            key: None,
            default,
            options: Vec::new(),
            range: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    #[must_use]
    pub fn id(&self) -> WidgetId {
        WidgetId::derive(self.kind, &self.label, self.key.as_deref())
    }

    /// Bring a stored value in line with this declaration.
    fn accept(&self, stored: Option<WidgetValue>) -> WidgetValue {
        let Some(value) = stored else {
            return self.default.clone();
        };
        if !same_shape(&value, &self.default) {
            tracing::warn!(
                label = %self.label,
                kind = %self.kind,
                ?value,
                "stored widget value has the wrong type; using default"
            );
            return self.default.clone();
        }
        if self.kind == WidgetKind::Radio {
            let in_range = value
                .as_int()
                .and_then(|i| usize::try_from(i).ok())
                .is_some_and(|i| i < self.options.len());
            return if in_range { value } else { self.default.clone() };
        }
        match (self.range, value.as_float()) {
            (Some((min, max)), Some(v)) => {
                let v = v.max(min).min(max);
                if matches!(self.default, WidgetValue::Int(_)) {
                    WidgetValue::Int(v as i64)
                } else {
                    WidgetValue::Float(v)
                }
            }
            _ => value,
        }
    }
}

fn same_shape(a: &WidgetValue, b: &WidgetValue) -> bool {
    let numeric = |v: &WidgetValue| matches!(v, WidgetValue::Int(_) | WidgetValue::Float(_));
    discriminant(a) == discriminant(b) || (numeric(a) && numeric(b))
}

/// Output and input surface of a running script.
pub struct ScriptContext {
    run_id: u64,
    report: Arc<Report>,
    argv: Vec<String>,
    sink: Arc<dyn MessageSink>,
    requests: Arc<ScriptRequestQueue>,
    widgets: Arc<WidgetStore>,
    cursors: Cursors,
    seen_widgets: HashSet<WidgetId>,
    emitted: usize,
}

impl ScriptContext {
    pub(crate) fn new(
        run_id: u64,
        report: Arc<Report>,
        argv: Vec<String>,
        sink: Arc<dyn MessageSink>,
        requests: Arc<ScriptRequestQueue>,
        widgets: Arc<WidgetStore>,
    ) -> Self {
        Self {
            run_id,
            report,
            argv,
            sink,
            requests,
            widgets,
            cursors: Cursors::default(),
            seen_widgets: HashSet::new(),
            emitted: 0,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    #[must_use]
    pub fn script_path(&self) -> &Path {
        self.report.script_path()
    }

    #[must_use]
    pub fn command_line(&self) -> &str {
        self.report.command_line()
    }

    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Messages sent so far in this run.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Consume one pending request, if any, and turn it into an interrupt.
    ///
    /// Called after every emission. Long computations that emit nothing can
    /// call it directly to stay responsive.
    pub fn checkpoint(&mut self) -> ScriptResult {
        let Some(request) = self.requests.dequeue() else {
            return Ok(());
        };
        crate::debug_trace!("checkpoint: run={} interrupted by {}", self.run_id, request.name());
        tracing::debug!(run_id = self.run_id, request = request.name(), "run interrupted");
        let interrupt = match request {
            ScriptRequest::Stop => Interrupt::Stop,
            ScriptRequest::Shutdown => Interrupt::Shutdown,
            ScriptRequest::Rerun(data) => Interrupt::Rerun(data),
        };
        Err(ScriptError::Interrupted(interrupt))
    }

    /// Send a raw message, then checkpoint.
    pub fn send(&mut self, msg: ForwardMsg) -> ScriptResult {
        tracing::trace!(run_id = self.run_id, msg = msg.type_name(), "emit");
        self.sink.send(msg)?;
        self.emitted += 1;
        self.checkpoint()
    }

    /// Write `element` into the next slot of `at`.
    pub fn emit(&mut self, at: &Container, element: Element) -> ScriptResult<Slot> {
        let path = self.cursors.advance(at);
        let slot = Slot::new(path.clone());
        self.send(ForwardMsg::new_element(path, element))?;
        Ok(slot)
    }

    pub fn text(&mut self, body: impl Into<String>) -> ScriptResult<Slot> {
        self.emit(&Container::main(), Element::text(body))
    }

    pub fn markdown(&mut self, body: impl Into<String>) -> ScriptResult<Slot> {
        self.emit(
            &Container::main(),
            Element::Markdown { body: body.into() },
        )
    }

    pub fn table(&mut self, table: Table) -> ScriptResult<Slot> {
        self.emit(&Container::main(), Element::Table(table))
    }

    /// Reserve a slot in `at` to be filled later with [`replace`](Self::replace).
    pub fn empty(&mut self, at: &Container) -> ScriptResult<Slot> {
        self.emit(at, Element::Empty)
    }

    /// Overwrite the content of an existing slot.
    pub fn replace(&mut self, slot: &Slot, element: Element) -> ScriptResult {
        self.send(ForwardMsg::new_element(slot.path().clone(), element))
    }

    /// Append rows to the table held by `slot`.
    pub fn add_rows(&mut self, slot: &Slot, rows: Table) -> ScriptResult {
        self.send(ForwardMsg::add_rows(slot.path().clone(), rows))
    }

    /// Open a nested block in the next slot of `at` and return it as a container.
    pub fn block(&mut self, at: &Container, kind: BlockKind) -> ScriptResult<Container> {
        let path = self.cursors.advance(at);
        let block = at.nested(path.index());
        self.send(ForwardMsg::new_block(path, kind))?;
        Ok(block)
    }

    /// Render a widget in `at` and return the value it holds for this run.
    ///
    /// Declaring two widgets with the same id in one run is a runtime error.
    pub fn widget(&mut self, at: &Container, spec: WidgetSpec) -> ScriptResult<WidgetValue> {
        let id = spec.id();
        if !self.seen_widgets.insert(id.clone()) {
            return Err(RuntimeError::new(format!(
                "duplicate widget id `{id}`: two {} widgets labelled {:?}; pass a distinct key",
                spec.kind, spec.label
            ))
            .with_kind("DuplicateWidgetId")
            .into());
        }
        let value = spec.accept(self.widgets.get_value(&id));
        let element = Element::Widget(WidgetElement {
            id,
            kind: spec.kind,
            label: spec.label,
            value: value.clone(),
            options: spec.options,
        });
        self.emit(at, element)?;
        Ok(value)
    }

    pub fn checkbox(&mut self, label: &str, default: bool) -> ScriptResult<bool> {
        let spec = WidgetSpec::new(WidgetKind::Checkbox, label, WidgetValue::Bool(default));
        let value = self.widget(&Container::main(), spec)?;
        Ok(value.as_bool().unwrap_or(default))
    }

    pub fn text_input(&mut self, label: &str, default: &str) -> ScriptResult<String> {
        let spec = WidgetSpec::new(
            WidgetKind::TextInput,
            label,
            WidgetValue::String(default.to_owned()),
        );
        let value = self.widget(&Container::main(), spec)?;
        Ok(value.as_str().unwrap_or(default).to_owned())
    }

    /// Returns the index of the selected option.
    pub fn radio(&mut self, label: &str, options: &[&str], default: usize) -> ScriptResult<usize> {
        let spec = WidgetSpec::new(WidgetKind::Radio, label, WidgetValue::Int(default as i64))
            .with_options(options.iter().copied());
        let value = self.widget(&Container::main(), spec)?;
        Ok(value
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or(default))
    }

    pub fn slider(&mut self, label: &str, min: f64, max: f64, default: f64) -> ScriptResult<f64> {
        let spec = WidgetSpec::new(WidgetKind::Slider, label, WidgetValue::Float(default))
            .with_range(min, max);
        let value = self.widget(&Container::main(), spec)?;
        Ok(value.as_float().unwrap_or(default))
    }

    /// `true` only in the run immediately following a click.
    pub fn button(&mut self, label: &str) -> ScriptResult<bool> {
        let spec = WidgetSpec::new(WidgetKind::Button, label, WidgetValue::Trigger(false));
        let value = self.widget(&Container::main(), spec)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Show `error` in the next main slot without checkpointing.
    ///
    /// Sink failures are logged; the run is already over at this point.
    pub(crate) fn render_exception(&mut self, error: &RuntimeError) {
        let path = self.cursors.advance(&Container::main());
        let msg = ForwardMsg::new_element(path, Element::Exception(error.to_exception()));
        match self.sink.send(msg) {
            Ok(()) => self.emitted += 1,
            Err(e) => tracing::warn!(error = %e, "failed to render script exception"),
        }
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("run_id", &self.run_id)
            .field("script_path", &self.report.script_path())
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}
