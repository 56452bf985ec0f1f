use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScanError;
use crate::record::FromRow;
use crate::submit::Submission;

/// What to do after a row fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPolicy {
    /// Record the failure and keep reading.
    #[default]
    Continue,
    /// Stop at the first failure.
    Halt,
}

/// A decode failure tied to the zero-based position of the row in the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowScanError {
    pub row: usize,
    pub error: ScanError,
}

impl fmt::Display for RowScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drained<R> {
    pub rows: Vec<R>,
    pub scan_errors: Vec<RowScanError>,
}

impl<R> Default for Drained<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            scan_errors: Vec::new(),
        }
    }
}

/// Read every row the cursor yields and decode it. Every yielded row is
/// accumulated; a row that fails to decode is recorded in `scan_errors` and
/// accumulated through [`FromRow::partial`]. A failed submission drains to
/// nothing.
pub async fn drain<R: FromRow>(submission: &mut Submission, policy: ScanPolicy) -> Drained<R> {
    let mut drained = Drained::default();
    let Submission::Submitted(cursor) = submission else {
        return drained;
    };

    let mut index = 0;
    while cursor.next().await {
        let row = cursor.current();
        let decoded = match row {
            Some(row) => R::from_row(row),
            None => Err(ScanError::NoCurrentRow),
        };
        match decoded {
            Ok(record) => drained.rows.push(record),
            Err(error) => {
                debug!(row = index, %error, "row failed to decode");
                drained.rows.push(R::partial(row));
                drained.scan_errors.push(RowScanError { row: index, error });
                if policy == ScanPolicy::Halt {
                    break;
                }
            }
        }
        index += 1;
    }

    debug!(
        rows = drained.rows.len(),
        scan_errors = drained.scan_errors.len(),
        "cursor drained"
    );
    drained
}
