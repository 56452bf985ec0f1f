//! Typed decoding of result rows.

use std::fmt;

use common::Row;
use serde::{Deserialize, Serialize};
use types::{SqlType, Value};

use crate::error::ScanError;

/// Decode a driver row into a typed record.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, ScanError>;

    /// Record kept for a row that `from_row` rejected. Fields that cannot be
    /// decoded take their zero value.
    fn partial(row: Option<&Row>) -> Self;
}

/// Three string columns, compared field by field in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub a: String,
    pub b: String,
    pub c: String,
}

impl Record {
    pub fn new(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: c.into(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} {}}}", self.a, self.b, self.c)
    }
}

impl FromRow for Record {
    fn from_row(row: &Row) -> Result<Self, ScanError> {
        let [a, b, c] = row.values.as_slice() else {
            return Err(ScanError::ColumnCount {
                expected: 3,
                actual: row.len(),
            });
        };
        Ok(Self {
            a: scan_text(0, a)?,
            b: scan_text(1, b)?,
            c: scan_text(2, c)?,
        })
    }

    fn partial(row: Option<&Row>) -> Self {
        let text = |idx: usize| {
            row.and_then(|row| row.values.get(idx))
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            a: text(0),
            b: text(1),
            c: text(2),
        }
    }
}

/// Rows decode into themselves; useful for untyped queries.
impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, ScanError> {
        Ok(row.clone())
    }

    fn partial(row: Option<&Row>) -> Self {
        row.cloned().unwrap_or_else(|| Row::new(Vec::new()))
    }
}

fn scan_text(column: usize, value: &Value) -> Result<String, ScanError> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        other => Err(ScanError::ColumnType {
            column,
            expected: SqlType::Text,
            actual: other.sql_type(),
        }),
    }
}
