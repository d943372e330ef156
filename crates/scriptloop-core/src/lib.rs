#![forbid(unsafe_code)]

//! Core: structural paths, render messages, tables, and the reconciling
//! forward queue.
//!
//! # Key Components
//!
//! - [`DeltaPath`] - Flat address of one UI slot
//! - [`ForwardMsg`] - Message bound for the renderer
//! - [`ForwardQueue`] - Thread-safe queue that folds repeated writes to a slot
//! - [`Table`] - Column-oriented payload extended by append-rows deltas
//!
//! # Role in scriptloop
//! `scriptloop-core` holds everything that does not depend on how a script
//! is executed. `scriptloop-runtime` drives scripts and writes into a
//! [`ForwardQueue`]; transports read from it.

pub mod delta_path;
pub mod error;
pub mod forward_queue;
pub mod logging;
pub mod message;
pub mod table;
pub mod widget;

#[cfg(feature = "tracing")]
pub use logging::{debug, trace, warn};

pub use delta_path::{DeltaPath, RootContainer, make_delta_path};
pub use error::{EnqueueError, InvalidDeltaPath};
pub use forward_queue::ForwardQueue;
pub use message::{
    BlockKind, Delta, Element, ExceptionInfo, ForwardMsg, RunMetadata, ScriptFinishedStatus,
    SessionEvent, SessionStatus, WidgetElement,
};
pub use table::{Column, ColumnType, ShapeMismatch, Table};
pub use widget::{WidgetId, WidgetKind, WidgetValue};
