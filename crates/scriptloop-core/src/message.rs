#![forbid(unsafe_code)]

//! Outbound render messages.
//!
//! A [`ForwardMsg`] is either a delta addressed to one UI slot (carrying a
//! [`DeltaPath`]) or a pathless session-level message. Only deltas take part
//! in reconciliation; everything else passes through the forward queue in
//! arrival order.

use crate::delta_path::DeltaPath;
use crate::table::Table;
use crate::widget::{WidgetId, WidgetKind, WidgetValue};

/// Metadata sent once at the start of every script run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunMetadata {
    /// Monotonic counter of runs within one session.
    pub run_id: u64,
    pub script_path: String,
    pub command_line: String,
    pub argv: Vec<String>,
}

/// Layout of a nested block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    Vertical,
    Horizontal,
    Expander { label: String, expanded: bool },
}

/// An error rendered in place of the script's remaining output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExceptionInfo {
    /// Short error category, e.g. `"RuntimeError"` or `"Panic"`.
    pub kind: String,
    pub message: String,
    /// Optional context lines, outermost first.
    pub stack: Vec<String>,
}

/// A rendered interactive control.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WidgetElement {
    pub id: WidgetId,
    pub kind: WidgetKind,
    pub label: String,
    /// Value the script observed during this run.
    pub value: WidgetValue,
    /// Choices for option-based widgets; empty otherwise.
    pub options: Vec<String>,
}

/// Content of one UI slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Element {
    /// Reserved slot with no content yet.
    Empty,
    Text { body: String },
    Markdown { body: String },
    Table(Table),
    Exception(ExceptionInfo),
    Widget(WidgetElement),
}

impl Element {
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Body of a text element.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { body } => Some(body),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text { .. } => "text",
            Self::Markdown { .. } => "markdown",
            Self::Table(_) => "table",
            Self::Exception(_) => "exception",
            Self::Widget(_) => "widget",
        }
    }
}

/// Change to a single UI slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Delta {
    /// Replace the slot's content wholesale.
    NewElement(Element),
    /// Open a nested block at the slot.
    NewBlock(BlockKind),
    /// Append rows to the table at the slot.
    AddRows(Table),
}

/// Whether the script is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionStatus {
    pub script_is_running: bool,
}

/// How a run ended, as reported to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScriptFinishedStatus {
    Success,
    CompileError,
}

/// Session-level notifications that are not tied to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionEvent {
    ScriptCompilationError { message: String },
}

/// One message bound for the renderer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForwardMsg {
    NewRun(RunMetadata),
    Delta { path: DeltaPath, delta: Delta },
    SessionStatus(SessionStatus),
    ScriptFinished(ScriptFinishedStatus),
    SessionEvent(SessionEvent),
}

impl ForwardMsg {
    /// Replace the slot at `path` with `element`.
    #[must_use]
    pub fn new_element(path: DeltaPath, element: Element) -> Self {
        Self::Delta {
            path,
            delta: Delta::NewElement(element),
        }
    }

    /// Open a block of `kind` at `path`.
    #[must_use]
    pub fn new_block(path: DeltaPath, kind: BlockKind) -> Self {
        Self::Delta {
            path,
            delta: Delta::NewBlock(kind),
        }
    }

    /// Append `rows` to the table at `path`.
    #[must_use]
    pub fn add_rows(path: DeltaPath, rows: Table) -> Self {
        Self::Delta {
            path,
            delta: Delta::AddRows(rows),
        }
    }

    /// Slot this message is addressed to, if it is a delta.
    #[must_use]
    pub fn delta_path(&self) -> Option<&DeltaPath> {
        match self {
            Self::Delta { path, .. } => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_delta(&self) -> bool {
        matches!(self, Self::Delta { .. })
    }

    /// Element carried by a `NewElement` delta.
    #[must_use]
    pub fn element(&self) -> Option<&Element> {
        match self {
            Self::Delta {
                delta: Delta::NewElement(element),
                ..
            } => Some(element),
            _ => None,
        }
    }

    /// Returns a name for logging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NewRun(_) => "NewRun",
            Self::Delta {
                delta: Delta::NewElement(_),
                ..
            } => "NewElement",
            Self::Delta {
                delta: Delta::NewBlock(_),
                ..
            } => "NewBlock",
            Self::Delta {
                delta: Delta::AddRows(_),
                ..
            } => "AddRows",
            Self::SessionStatus(_) => "SessionStatus",
            Self::ScriptFinished(_) => "ScriptFinished",
            Self::SessionEvent(_) => "SessionEvent",
        }
    }
}
