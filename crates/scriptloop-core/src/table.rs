#![forbid(unsafe_code)]

//! Column-oriented tables carried by table elements and append-rows deltas.
//!
//! Appending is positional: column `i` of the incoming rows extends column
//! `i` of the base. Column count and column types must agree; otherwise the
//! append fails with [`ShapeMismatch`] and the base is left untouched.

use std::fmt;

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Text,
}

impl ColumnType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed column of values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Column {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl Column {
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Int64(_) => ColumnType::Int64,
            Self::Float64(_) => ColumnType::Float64,
            Self::Bool(_) => ColumnType::Bool,
            Self::Text(_) => ColumnType::Text,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extend with the values of a column of the same type.
    ///
    /// Callers check types first; a mismatch here is a no-op.
    fn extend_from(&mut self, other: &Column) {
        match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => a.extend_from_slice(b),
            (Self::Float64(a), Self::Float64(b)) => a.extend_from_slice(b),
            (Self::Bool(a), Self::Bool(b)) => a.extend_from_slice(b),
            (Self::Text(a), Self::Text(b)) => a.extend_from_slice(b),
            _ => {}
        }
    }
}

/// Reason an append (or table construction) was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    /// The incoming rows have a different number of columns than the base.
    ColumnCount { expected: usize, found: usize },
    /// Column `column` holds a different type than the base.
    ColumnType {
        column: usize,
        expected: ColumnType,
        found: ColumnType,
    },
    /// Columns of one table have different lengths.
    RaggedColumns {
        column: usize,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnCount { expected, found } => {
                write!(f, "expected {expected} columns, found {found}")
            }
            Self::ColumnType {
                column,
                expected,
                found,
            } => write!(f, "column {column}: expected {expected}, found {found}"),
            Self::RaggedColumns {
                column,
                expected,
                found,
            } => write!(f, "column {column}: expected {expected} rows, found {found}"),
        }
    }
}

impl std::error::Error for ShapeMismatch {}

/// A rectangular, column-oriented table.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// A table with no columns. Appending to it adopts the incoming shape.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table, rejecting columns of unequal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ShapeMismatch> {
        check_rectangular(&columns)?;
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Append `rows` below the existing rows.
    ///
    /// Validation happens before any column is touched, so a failed append
    /// leaves `self` unchanged.
    pub fn append_rows(&mut self, rows: &Table) -> Result<(), ShapeMismatch> {
        if self.columns.is_empty() {
            self.columns = rows.columns.clone();
            return Ok(());
        }
        if rows.columns.len() != self.columns.len() {
            return Err(ShapeMismatch::ColumnCount {
                expected: self.columns.len(),
                found: rows.columns.len(),
            });
        }
        for (column, (base, incoming)) in self.columns.iter().zip(&rows.columns).enumerate() {
            let (expected, found) = (base.column_type(), incoming.column_type());
            if expected != found {
                return Err(ShapeMismatch::ColumnType {
                    column,
                    expected,
                    found,
                });
            }
        }
        for (base, incoming) in self.columns.iter_mut().zip(&rows.columns) {
            base.extend_from(incoming);
        }
        Ok(())
    }
}

fn check_rectangular(columns: &[Column]) -> Result<(), ShapeMismatch> {
    let Some(expected) = columns.first().map(Column::len) else {
        return Ok(());
    };
    for (column, col) in columns.iter().enumerate().skip(1) {
        if col.len() != expected {
            return Err(ShapeMismatch::RaggedColumns {
                column,
                expected,
                found: col.len(),
            });
        }
    }
    Ok(())
}
