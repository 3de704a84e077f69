//! Mapping between JSON records and sheet rows.
//!
//! Records travel as JSON objects keyed by column name. A [`SheetSchema`]
//! says how each column is written to a cell: plain text, optional text
//! (empty cell = null) or a JSON-encoded value (numbers, booleans, lists).

use serde_json::{Map, Value};
use thiserror::Error;

use crate::workbook::Row;

/// Record mapping errors.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Expected a JSON object for sheet {0}")]
    NotAnObject(&'static str),

    #[error("Bad cell in column {column}: {message}")]
    BadCell { column: String, message: String },
}

pub type RecordResult<T> = Result<T, RecordError>;

/// How a column value is stored in its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Required string; an empty cell is the empty string.
    Text,
    /// Optional string; an empty cell is null and `""` is the empty string.
    OptionalText,
    /// Any JSON value; an empty cell is null.
    Json,
}

/// A named column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: CellKind,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: CellKind::Text }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, kind: CellKind::OptionalText }
    }

    pub const fn json(name: &'static str) -> Self {
        Self { name, kind: CellKind::Json }
    }
}

/// Sheet name plus its column layout.
#[derive(Debug, Clone, Copy)]
pub struct SheetSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl SheetSchema {
    /// Header row used when the sheet is created.
    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Encode a JSON object into a row laid out by `header`.
    ///
    /// Header columns unknown to the schema keep the value they had in
    /// `existing` (columns added by hand in the spreadsheet survive updates).
    pub fn encode(&self, header: &[String], record: &Value, existing: Option<&Row>) -> RecordResult<Row> {
        let object = record
            .as_object()
            .ok_or(RecordError::NotAnObject(self.name))?;

        let row = header
            .iter()
            .enumerate()
            .map(|(i, name)| match self.column(name) {
                Some(column) => encode_cell(column.kind, object.get(name.as_str())),
                None => existing
                    .and_then(|r| r.get(i))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();

        let missing: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !header.iter().any(|h| h == c.name))
            .map(|c| c.name)
            .collect();
        if !missing.is_empty() {
            log::warn!(
                "Sheet {} is missing columns {:?}; their values are not stored",
                self.name,
                missing
            );
        }

        Ok(row)
    }

    /// Decode a row laid out by `header` into a JSON object.
    ///
    /// Short rows (trailing empty cells trimmed by the spreadsheet) and schema
    /// columns absent from the header read as empty cells.
    pub fn decode(&self, header: &[String], row: &Row) -> RecordResult<Value> {
        let mut object = Map::new();
        for column in self.columns {
            let cell = header
                .iter()
                .position(|h| h == column.name)
                .and_then(|i| row.get(i))
                .map(String::as_str)
                .unwrap_or("");
            object.insert(column.name.to_string(), decode_cell(column, cell)?);
        }
        Ok(Value::Object(object))
    }
}

fn encode_cell(kind: CellKind, value: Option<&Value>) -> String {
    match (kind, value) {
        (_, None) | (_, Some(Value::Null)) => String::new(),
        (CellKind::OptionalText, Some(Value::String(s))) if needs_quoting(s) => {
            Value::String(s.clone()).to_string()
        }
        (CellKind::Text | CellKind::OptionalText, Some(Value::String(s))) => s.clone(),
        (_, Some(other)) => other.to_string(),
    }
}

/// An optional cell is empty only for null. The empty string, and text that
/// itself starts with a quote, are stored JSON-quoted.
fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s.starts_with('"')
}

fn decode_cell(column: &Column, cell: &str) -> RecordResult<Value> {
    match column.kind {
        CellKind::Text => Ok(Value::String(cell.to_string())),
        CellKind::OptionalText if cell.is_empty() => Ok(Value::Null),
        // Hand-typed text with a leading quote is kept as written
        CellKind::OptionalText if cell.starts_with('"') => Ok(Value::String(
            serde_json::from_str(cell).unwrap_or_else(|_| cell.to_string()),
        )),
        CellKind::OptionalText => Ok(Value::String(cell.to_string())),
        CellKind::Json if cell.trim().is_empty() => Ok(Value::Null),
        CellKind::Json => serde_json::from_str(cell).map_err(|e| RecordError::BadCell {
            column: column.name.to_string(),
            message: e.to_string(),
        }),
    }
}
