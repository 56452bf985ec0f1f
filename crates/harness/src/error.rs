//! Error types for the harness.
//!
//! [`HarnessError`] aborts a run. [`StageError`] and [`ScanError`] are
//! observations about a single case and end up in its verdict instead.

use std::fmt;

use driver::DriverError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::SqlType;

use crate::case::Stage;

/// Result alias for operations that can abort a run.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Fixture lifecycle step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixturePhase {
    Create,
    Load,
    Drop,
}

impl fmt::Display for FixturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixturePhase::Create => "create",
            FixturePhase::Load => "load",
            FixturePhase::Drop => "drop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("fixture {phase} failed for table {table}: {source}")]
    Fixture {
        phase: FixturePhase,
        table: String,
        #[source]
        source: DriverError,
    },
    #[error("failed to open connection to {dsn}: {source}")]
    Connect {
        dsn: String,
        #[source]
        source: DriverError,
    },
}

/// Why a row could not be decoded into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ScanError {
    #[error("cursor advanced but has no current row")]
    NoCurrentRow,
    #[error("expected {expected} columns, got {actual}")]
    ColumnCount { expected: usize, actual: usize },
    #[error(
        "column {column}: cannot scan {} into {expected}",
        .actual.map_or_else(|| "NULL".to_string(), |ty| ty.to_string())
    )]
    ColumnType {
        column: usize,
        expected: SqlType,
        actual: Option<SqlType>,
    },
}

/// An error observed at one stage of a case.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StageError {
    #[error("{0}")]
    Submit(DriverError),
    #[error("row {row}: {source}")]
    Scan { row: usize, source: ScanError },
    #[error("{0}")]
    Close(DriverError),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Submit(_) => Stage::Submit,
            StageError::Scan { .. } => Stage::Scan,
            StageError::Close(_) => Stage::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_messages() {
        let err = ScanError::ColumnType {
            column: 1,
            expected: SqlType::Text,
            actual: None,
        };
        assert_eq!(err.to_string(), "column 1: cannot scan NULL into STRING");

        let err = ScanError::ColumnType {
            column: 0,
            expected: SqlType::Text,
            actual: Some(SqlType::Int),
        };
        assert_eq!(err.to_string(), "column 0: cannot scan INT64 into STRING");
    }

    #[test]
    fn stage_errors_know_their_stage() {
        let err = StageError::Scan {
            row: 2,
            source: ScanError::NoCurrentRow,
        };
        assert_eq!(err.stage(), Stage::Scan);
        assert_eq!(err.to_string(), "row 2: cursor advanced but has no current row");

        let err = StageError::Close(DriverError::not_found("Table not found: T"));
        assert_eq!(err.stage(), Stage::Close);
    }

    #[test]
    fn fixture_error_names_phase_and_table() {
        let err = HarnessError::Fixture {
            phase: FixturePhase::Load,
            table: "T".into(),
            source: DriverError::already_exists("Row [a1] in table T already exists"),
        };
        assert!(err.to_string().starts_with("fixture load failed for table T"));
    }
}
