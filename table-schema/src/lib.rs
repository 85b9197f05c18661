//! Data model for the table subsystem: table definitions, rows, and the two
//! flavors of event chunk CRUD calls carry.
//!
//! The column-type lattice here is deliberately small, just enough to
//! describe a base table's columns, unlike the full `DfType`/`DfValue`
//! lattice the query compiler owns upstream; that compiler is out of scope.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The semantic type of a single column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int,
    BigInt,
    Float,
    Double,
    Text,
    Timestamp,
}

/// A single concrete value stored in a row. Each variant corresponds to one
/// [`ColumnType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Timestamp(i64),
    /// A SQL `NULL`, valid for any column type.
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::BigInt(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Double(v) => write!(f, "{v}"),
            CellValue::Text(v) => write!(f, "{v}"),
            CellValue::Timestamp(v) => write!(f, "{v}"),
            CellValue::Null => f.write_str("NULL"),
        }
    }
}

/// A single column's name and semantic type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An immutable descriptor for a table: a unique id and an ordered sequence
/// of columns. Created at query-compile time, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub id: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(id: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            id: id.into(),
            columns,
        }
    }

    /// The index of the named column, if it exists.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, idx: usize) -> Option<&ColumnDefinition> {
        self.columns.get(idx)
    }
}

/// A row of data conforming to a [`TableDefinition`]: an ordered tuple of
/// cell values, one per column.
pub type Row = Vec<CellValue>;

/// Rows to be inserted, carried by `add_events`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamEventChunk(pub Vec<Row>);

impl StreamEventChunk {
    pub fn new(rows: Vec<Row>) -> Self {
        Self(rows)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for StreamEventChunk {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Row> for StreamEventChunk {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An event that carries correlated fields from upstream joined streams:
/// `row` is the table-shaped payload, `matching` is the schema used to
/// drive predicate matching.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    pub row: Row,
    pub matching: Row,
}

impl StateEvent {
    pub fn new(row: Row, matching: Row) -> Self {
        Self { row, matching }
    }
}

/// State events, carried by `delete_events`/`update_events`/
/// `update_or_add_events`, and used for matching in `find`/`contains_event`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateEventChunk(pub Vec<StateEvent>);

impl StateEventChunk {
    pub fn new(events: Vec<StateEvent>) -> Self {
        Self(events)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for StateEventChunk {
    type Item = StateEvent;
    type IntoIter = std::vec::IntoIter<StateEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<StateEvent> for StateEventChunk {
    fn from_iter<I: IntoIterator<Item = StateEvent>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
