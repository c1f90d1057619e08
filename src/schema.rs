//! Snapshot types for tables and columns.
//!
//! These types describe the reconstructed shape of a table at some point in
//! migration history. They exist only transiently inside a snapshot fold and
//! are never persisted: the authoritative state is always the ordered
//! operation log plus the ledger.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Column type tags supported by the migration system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Variable-length character string (takes a `length` param).
    Varchar,
    /// Unbounded text.
    Text,
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Boolean.
    Boolean,
    /// Arbitrary-precision numeric (takes a `digits` param).
    Numeric,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Date and time.
    Timestamp,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// JSON data.
    Json,
    /// UUID.
    Uuid,
    /// Binary data.
    Bytea,
    /// Reference to another table (takes a `references` param).
    ForeignKey,
}

/// A single column parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Boolean flag (`null`, `unique`, `index`, ...).
    Bool(bool),
    /// Integer value (`length`, ...).
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// String value (`references`, string defaults, ...).
    Text(String),
    /// Precision/scale pair for numeric columns (`digits`).
    Pair(u32, u32),
    /// Explicit NULL (used for `default`).
    Null,
}

impl ParamValue {
    /// Returns the boolean value, if this parameter is a flag.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the SQL literal for this value when used as a default.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Pair(p, s) => format!("({p}, {s})"),
            Self::Null => "NULL".to_string(),
        }
    }
}

/// An insertion-ordered map of column parameters.
///
/// Order matters for reproducible DDL, so this is a thin wrapper over a
/// `Vec` of pairs rather than a hash map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing an existing value in place or appending.
    pub fn set(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Fluent variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.set(key, value);
        self
    }

    /// Gets a parameter by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Applies every entry of `other` on top of this map.
    pub fn merge(&mut self, other: &Params) {
        for (key, value) in &other.0 {
            self.set(key.clone(), value.clone());
        }
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reconstructed definition of a single column.
///
/// Immutable once constructed; renames and alters inside a fold replace the
/// snapshot rather than mutating shared state. Only the current name is
/// tracked, so chained renames compose in sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    /// Column name.
    pub name: String,
    /// Column type tag.
    pub type_tag: ColumnType,
    /// Column parameters, in insertion order.
    pub params: Params,
}

impl ColumnSnapshot {
    /// Creates a new column snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, type_tag: ColumnType) -> Self {
        Self {
            name: name.into(),
            type_tag,
            params: Params::new(),
        }
    }

    /// Sets an arbitrary parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.set(key, value);
        self
    }

    /// Sets the `length` parameter (Varchar columns).
    #[must_use]
    pub fn length(self, length: i64) -> Self {
        self.param("length", ParamValue::Integer(length))
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(self) -> Self {
        self.param("null", ParamValue::Bool(false))
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub fn unique(self) -> Self {
        self.param("unique", ParamValue::Bool(true))
    }

    /// Requests a plain index on the column.
    #[must_use]
    pub fn index(self) -> Self {
        self.param("index", ParamValue::Bool(true))
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(self, value: ParamValue) -> Self {
        self.param("default", value)
    }

    /// Sets the referenced tablename (ForeignKey columns).
    #[must_use]
    pub fn references(self, tablename: impl Into<String>) -> Self {
        self.param("references", ParamValue::Text(tablename.into()))
    }
}

/// Reconstructed definition of a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Mapped class name (e.g. "Band").
    pub class_name: String,
    /// Database table name (e.g. "band").
    pub tablename: String,
    /// Schema the table lives in.
    pub schema_name: String,
    /// Column definitions, in creation order.
    pub columns: Vec<ColumnSnapshot>,
    /// Free-form tags attached to the table.
    pub tags: BTreeSet<String>,
}

impl TableSnapshot {
    /// Creates a new table snapshot in the default `public` schema.
    #[must_use]
    pub fn new(class_name: impl Into<String>, tablename: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            tablename: tablename.into(),
            schema_name: "public".to_string(),
            columns: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Moves the table to a named schema.
    #[must_use]
    pub fn in_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = schema_name.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSnapshot) -> Self {
        self.columns.push(column);
        self
    }

    /// Attaches a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSnapshot> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut ColumnSnapshot> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}
