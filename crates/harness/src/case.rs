//! Declarative test cases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure point in a query's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Query submission.
    Submit,
    /// Row iteration and decoding.
    Scan,
    /// Closing the cursor and collecting its deferred error.
    Close,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Submit, Stage::Scan, Stage::Close];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submit => "submit",
            Stage::Scan => "scan",
            Stage::Close => "close",
        };
        f.write_str(name)
    }
}

/// Which stages are expected to report an error. Any combination is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    pub submit_error: bool,
    pub scan_error: bool,
    pub close_error: bool,
}

impl Expectations {
    pub fn expects(&self, stage: Stage) -> bool {
        match stage {
            Stage::Submit => self.submit_error,
            Stage::Scan => self.scan_error,
            Stage::Close => self.close_error,
        }
    }

    fn set(&mut self, stage: Stage) {
        match stage {
            Stage::Submit => self.submit_error = true,
            Stage::Scan => self.scan_error = true,
            Stage::Close => self.close_error = true,
        }
    }
}

/// One query, the rows it must return in order, and the stages at which
/// it must fail.
///
/// # Example
///
/// ```
/// use harness::{Record, Stage, TestCase};
///
/// let case = TestCase::new("select one tuple", r#"SELECT * FROM T WHERE A = "a1""#)
///     .want_rows([Record::new("a1", "b1", "c1")]);
/// assert!(!case.expectations().expects(Stage::Close));
///
/// let broken = TestCase::<Record>::new("empty query", "").expect_close_error();
/// assert!(broken.want().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase<R> {
    name: String,
    query: String,
    want: Vec<R>,
    expectations: Expectations,
}

impl<R> TestCase<R> {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            want: Vec::new(),
            expectations: Expectations::default(),
        }
    }

    pub fn want_rows(mut self, rows: impl IntoIterator<Item = R>) -> Self {
        self.want = rows.into_iter().collect();
        self
    }

    pub fn expect_error(mut self, stage: Stage) -> Self {
        self.expectations.set(stage);
        self
    }

    pub fn expect_submit_error(self) -> Self {
        self.expect_error(Stage::Submit)
    }

    pub fn expect_scan_error(self) -> Self {
        self.expect_error(Stage::Scan)
    }

    pub fn expect_close_error(self) -> Self {
        self.expect_error(Stage::Close)
    }

    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.expectations = expectations;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn want(&self) -> &[R] {
        &self.want
    }

    pub fn expectations(&self) -> Expectations {
        self.expectations
    }
}
