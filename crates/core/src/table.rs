//! Tabular reference data.
//!
//! A [`Table`] is built once from raw text records: its column schema is
//! inferred from the whole file, then every row is validated against that
//! schema and converted into typed [`Value`]s. Tables are immutable after
//! construction.

use serde::{Deserialize, Serialize};
use crate::error::TableError;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// The inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Numeric columns are right-aligned when rendered as a grid.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Infer the narrowest kind that accepts every non-empty cell.
    ///
    /// A column with no non-empty cells is `Text`.
    pub fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut present = cells.filter(|c| !c.is_empty()).peekable();
        if present.peek().is_none() {
            return Self::Text;
        }
        let present: Vec<&str> = present.collect();

        let integer_literals = present.iter().all(|c| is_integer_literal(c));
        if integer_literals && present.iter().all(|c| c.trim().parse::<i64>().is_ok()) {
            Self::Integer
        } else if integer_literals {
            // Wider than i64: keep the digits verbatim.
            Self::Text
        } else if present.iter().all(|c| parse_finite(c).is_some()) {
            Self::Float
        } else if present.iter().all(|c| parse_bool(c).is_some()) {
            Self::Boolean
        } else {
            Self::Text
        }
    }

    /// Convert a raw cell under this kind. Empty cells become `Null`.
    fn convert(self, cell: &str) -> Option<Value> {
        if cell.is_empty() {
            return Some(Value::Null);
        }
        match self {
            Self::Integer => cell.trim().parse().ok().map(Value::Integer),
            Self::Float => parse_finite(cell).map(Value::Float),
            Self::Boolean => parse_bool(cell).map(Value::Boolean),
            Self::Text => Some(Value::Text(cell.to_string())),
        }
    }
}

fn is_integer_literal(cell: &str) -> bool {
    let cell = cell.trim();
    let digits = cell.strip_prefix(['+', '-']).unwrap_or(cell);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_finite(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// One loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from a header and raw text records.
    ///
    /// Fails with [`TableError::RaggedRow`] if any record's field count
    /// differs from the header's.
    pub fn from_records(
        name: impl Into<String>,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Result<Self, TableError> {
        let name = name.into();

        for (idx, record) in records.iter().enumerate() {
            if record.len() != headers.len() {
                return Err(TableError::RaggedRow {
                    table: name,
                    row: idx + 1,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
        }

        let columns: Vec<Column> = headers
            .into_iter()
            .enumerate()
            .map(|(i, header)| Column {
                kind: ColumnKind::infer(records.iter().map(|r| r[i].as_str())),
                name: header,
            })
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(columns.len());
            for (column, cell) in columns.iter().zip(record) {
                let value = column.kind.convert(cell).ok_or_else(|| TableError::Parse {
                    table: name.clone(),
                    reason: format!(
                        "row {}: value {:?} does not fit column {:?} ({:?})",
                        idx + 1,
                        cell,
                        column.name,
                        column.kind
                    ),
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        Ok(Self { name, columns, rows })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// An ordered set of tables, iterated in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: Vec<Table>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table, keeping insertion order. A table with the same name
    /// replaces the earlier one in place.
    pub fn push(&mut self, table: Table) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Table> {
        self.tables.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<'a> IntoIterator for &'a TableSet {
    type Item = &'a Table;
    type IntoIter = std::slice::Iter<'a, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// How tables are embedded into the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// One minified JSON object: table name → array of records.
    #[default]
    Json,
    /// One pipe-table block per table, each under a `## name` heading.
    Markdown,
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}
