use driver::DriverError;
use serde::{Deserialize, Serialize};

use crate::case::Stage;
use crate::drain::{Drained, RowScanError};
use crate::error::StageError;

/// Everything observed while running one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome<R> {
    pub submit_error: Option<DriverError>,
    pub rows: Vec<R>,
    pub scan_errors: Vec<RowScanError>,
    pub close_error: Option<DriverError>,
}

impl<R> ExecutionOutcome<R> {
    pub fn new(
        submit_error: Option<DriverError>,
        drained: Drained<R>,
        close_error: Option<DriverError>,
    ) -> Self {
        Self {
            submit_error,
            rows: drained.rows,
            scan_errors: drained.scan_errors,
            close_error,
        }
    }

    /// First error observed at `stage`, if any.
    pub fn first_error(&self, stage: Stage) -> Option<StageError> {
        match stage {
            Stage::Submit => self.submit_error.clone().map(StageError::Submit),
            Stage::Scan => self.scan_errors.first().map(|e| StageError::Scan {
                row: e.row,
                source: e.error.clone(),
            }),
            Stage::Close => self.close_error.clone().map(StageError::Close),
        }
    }

    pub fn failed_at(&self, stage: Stage) -> bool {
        match stage {
            Stage::Submit => self.submit_error.is_some(),
            Stage::Scan => !self.scan_errors.is_empty(),
            Stage::Close => self.close_error.is_some(),
        }
    }

    /// Rows that decoded cleanly. Every yielded row is in `rows`, so this is
    /// what remains after the failed ones.
    pub fn decoded_rows(&self) -> usize {
        self.rows.len().saturating_sub(self.scan_errors.len())
    }

    /// Every error in stage order.
    pub fn stage_errors(&self) -> Vec<StageError> {
        let mut errors = Vec::new();
        errors.extend(self.submit_error.clone().map(StageError::Submit));
        errors.extend(self.scan_errors.iter().map(|e| StageError::Scan {
            row: e.row,
            source: e.error.clone(),
        }));
        errors.extend(self.close_error.clone().map(StageError::Close));
        errors
    }
}
