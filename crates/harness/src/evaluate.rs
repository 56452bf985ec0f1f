//! Comparison of an outcome against a case's expectations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::case::{Stage, TestCase};
use crate::error::StageError;
use crate::outcome::ExecutionOutcome;

/// One dimension in which a case did not behave as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mismatch {
    UnexpectedError { stage: Stage, error: StageError },
    MissingError { stage: Stage },
    /// Scan errors were expected on every row, but only some rows failed.
    PartialScan { failed_rows: usize, ok_rows: usize },
    /// Rows are rendered with `Debug` so verdicts stay independent of the
    /// record type.
    RowMismatch { want: Vec<String>, got: Vec<String> },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::UnexpectedError { stage, error } => {
                write!(f, "unexpected {stage} error: {error}")
            }
            Mismatch::MissingError { stage } => {
                write!(f, "expected {stage} error but got none")
            }
            Mismatch::PartialScan {
                failed_rows,
                ok_rows,
            } => write!(
                f,
                "expected scan error on every row but {ok_rows} of {} decoded",
                failed_rows + ok_rows
            ),
            Mismatch::RowMismatch { want, got } => write!(
                f,
                "row mismatch: want [{}], got [{}]",
                want.join(", "),
                got.join(", ")
            ),
        }
    }
}

/// Result of one case. Passes when there are no mismatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub case: String,
    pub mismatches: Vec<Mismatch>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "{}: ok", self.case);
        }
        let details = self
            .mismatches
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}: {}", self.case, details)
    }
}

/// Check each stage independently, then compare rows in order.
///
/// The scan stage is judged row by row: every yielded row must fail to
/// decode exactly when the case expects scan errors. A case that yields no
/// rows has nothing to judge at that stage.
pub fn evaluate<R>(case: &TestCase<R>, outcome: &ExecutionOutcome<R>) -> Verdict
where
    R: PartialEq + fmt::Debug,
{
    let expectations = case.expectations();
    let mut mismatches = Vec::new();

    for stage in Stage::ALL {
        let expected = expectations.expects(stage);
        let mismatch = match stage {
            Stage::Scan => scan_mismatch(expected, outcome),
            _ => match (outcome.first_error(stage), expected) {
                (Some(error), false) => Some(Mismatch::UnexpectedError { stage, error }),
                (None, true) => Some(Mismatch::MissingError { stage }),
                _ => None,
            },
        };
        mismatches.extend(mismatch);
    }

    if case.want() != outcome.rows.as_slice() {
        mismatches.push(Mismatch::RowMismatch {
            want: render(case.want()),
            got: render(&outcome.rows),
        });
    }

    Verdict {
        case: case.name().to_string(),
        mismatches,
    }
}

fn scan_mismatch<R>(expected: bool, outcome: &ExecutionOutcome<R>) -> Option<Mismatch> {
    let failed_rows = outcome.scan_errors.len();
    let ok_rows = outcome.decoded_rows();
    match (expected, failed_rows, ok_rows) {
        (false, 0, _) => None,
        (false, _, _) => outcome
            .first_error(Stage::Scan)
            .map(|error| Mismatch::UnexpectedError {
                stage: Stage::Scan,
                error,
            }),
        (true, _, 0) => None,
        (true, 0, _) => Some(Mismatch::MissingError { stage: Stage::Scan }),
        (true, failed_rows, ok_rows) => Some(Mismatch::PartialScan {
            failed_rows,
            ok_rows,
        }),
    }
}

fn render<R: fmt::Debug>(rows: &[R]) -> Vec<String> {
    rows.iter().map(|row| format!("{row:?}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Expectations;
    use crate::drain::{Drained, RowScanError};
    use crate::error::ScanError;
    use crate::record::Record;
    use driver::DriverError;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn outcome(
        submit: bool,
        scan: bool,
        close: bool,
        rows: Vec<Record>,
    ) -> ExecutionOutcome<Record> {
        // A failing scan stage fails on every row, or on a lone row that had
        // no current value.
        let scan_errors = if scan {
            (0..rows.len().max(1))
                .map(|row| RowScanError {
                    row,
                    error: ScanError::NoCurrentRow,
                })
                .collect()
        } else {
            Vec::new()
        };
        ExecutionOutcome::new(
            submit.then(|| DriverError::invalid_argument("bad query")),
            Drained { rows, scan_errors },
            close.then(|| DriverError::not_found("Table not found: NonExistent")),
        )
    }

    #[test]
    fn matching_case_passes() {
        let case = TestCase::new("one", "SELECT 1").want_rows([Record::new("a1", "b1", "c1")]);
        let verdict = evaluate(&case, &outcome(false, false, false, vec![Record::new("a1", "b1", "c1")]));
        assert!(verdict.passed());
        assert_eq!(verdict.to_string(), "one: ok");
    }

    #[test]
    fn unexpected_close_error_is_reported() {
        let case = TestCase::<Record>::new("nothing", "SELECT 1");
        let verdict = evaluate(&case, &outcome(false, false, true, Vec::new()));
        assert_eq!(verdict.mismatches.len(), 1);
        assert_eq!(
            verdict.mismatches[0].to_string(),
            "unexpected close error: code = NotFound, desc = Table not found: NonExistent"
        );
    }

    #[test]
    fn missing_error_is_reported() {
        let case = TestCase::<Record>::new("broken", "").expect_close_error();
        let verdict = evaluate(&case, &outcome(false, false, false, Vec::new()));
        assert_eq!(
            verdict.mismatches,
            vec![Mismatch::MissingError {
                stage: Stage::Close
            }]
        );
        assert_eq!(
            verdict.mismatches[0].to_string(),
            "expected close error but got none"
        );
    }

    #[test]
    fn row_order_matters() {
        let a = Record::new("a1", "b1", "c1");
        let b = Record::new("a2", "b2", "c2");
        let case = TestCase::new("ordered", "SELECT").want_rows([a.clone(), b.clone()]);
        let verdict = evaluate(&case, &outcome(false, false, false, vec![b, a]));
        assert_eq!(verdict.mismatches.len(), 1);
        assert!(verdict.mismatches[0]
            .to_string()
            .starts_with("row mismatch: want [Record { a: \"a1\""));
    }

    #[test]
    fn each_dimension_is_recorded_separately() {
        let case = TestCase::new("everything", "SELECT")
            .want_rows([Record::new("x", "y", "z")])
            .expect_submit_error();
        let verdict = evaluate(&case, &outcome(false, true, true, Vec::new()));
        let kinds: Vec<_> = verdict
            .mismatches
            .iter()
            .map(|m| match m {
                Mismatch::UnexpectedError { stage, .. } => format!("unexpected {stage}"),
                Mismatch::MissingError { stage } => format!("missing {stage}"),
                Mismatch::PartialScan { .. } => "partial scan".to_string(),
                Mismatch::RowMismatch { .. } => "rows".to_string(),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["missing submit", "unexpected scan", "unexpected close", "rows"]
        );
    }

    fn scanned(rows: Vec<Record>, failed: &[usize]) -> ExecutionOutcome<Record> {
        let scan_errors = failed
            .iter()
            .map(|&row| RowScanError {
                row,
                error: ScanError::ColumnType {
                    column: 2,
                    expected: types::SqlType::Text,
                    actual: None,
                },
            })
            .collect();
        ExecutionOutcome::new(None, Drained { rows, scan_errors }, None)
    }

    #[test]
    fn scan_expectation_holds_for_every_row() {
        let good = Record::new("a1", "b1", "c1");
        let partial = Record::new("a2", "b2", "");
        let case = TestCase::new("mixed", "SELECT")
            .want_rows([good.clone(), partial.clone()])
            .expect_scan_error();

        let verdict = evaluate(&case, &scanned(vec![good.clone(), partial.clone()], &[1]));
        assert_eq!(
            verdict.mismatches,
            vec![Mismatch::PartialScan {
                failed_rows: 1,
                ok_rows: 1
            }]
        );
        assert_eq!(
            verdict.to_string(),
            "mixed: expected scan error on every row but 1 of 2 decoded"
        );

        let verdict = evaluate(&case, &scanned(vec![good.clone(), partial.clone()], &[0, 1]));
        assert!(verdict.passed(), "{verdict}");

        let verdict = evaluate(&case, &scanned(vec![good, partial], &[]));
        assert_eq!(
            verdict.mismatches,
            vec![Mismatch::MissingError { stage: Stage::Scan }]
        );
    }

    #[test]
    fn scan_expectation_without_rows_has_nothing_to_judge() {
        let case = TestCase::<Record>::new("empty", "SELECT").expect_scan_error();
        assert!(evaluate(&case, &scanned(Vec::new(), &[])).passed());
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        ("[a-c][0-3]", "[a-c][0-3]", "[a-c][0-3]").prop_map(|(a, b, c)| Record::new(a, b, c))
    }

    proptest! {
        #[test]
        fn verdict_passes_iff_everything_matches(
            expected in any::<[bool; 3]>(),
            actual in any::<[bool; 3]>(),
            want in prop::collection::vec(arb_record(), 0..4),
            got in prop::collection::vec(arb_record(), 0..4),
        ) {
            let [submit_error, scan_error, close_error] = expected;
            let case = TestCase::new("prop", "SELECT")
                .want_rows(want.clone())
                .with_expectations(Expectations {
                    submit_error,
                    scan_error,
                    close_error,
                });

            let verdict = evaluate(&case, &outcome(actual[0], actual[1], actual[2], got.clone()));
            // A missing scan error only shows once some row was read.
            let scan_mismatch = if scan_error {
                !actual[1] && !got.is_empty()
            } else {
                actual[1]
            };
            let stage_mismatches = usize::from(submit_error != actual[0])
                + usize::from(scan_mismatch)
                + usize::from(close_error != actual[2]);
            let row_mismatch = usize::from(want != got);

            prop_assert_eq!(verdict.mismatches.len(), stage_mismatches + row_mismatch);
            prop_assert_eq!(verdict.passed(), stage_mismatches == 0 && want == got);
        }

        #[test]
        fn evaluation_is_deterministic(
            flags in any::<[bool; 3]>(),
            got in prop::collection::vec(arb_record(), 0..4),
        ) {
            let case = TestCase::new("again", "SELECT").want_rows(got.clone());
            let outcome = outcome(flags[0], flags[1], flags[2], got);
            prop_assert_eq!(evaluate(&case, &outcome), evaluate(&case, &outcome));
        }
    }
}
