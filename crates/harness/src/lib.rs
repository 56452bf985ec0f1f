//! Query-result lifecycle harness.
//!
//! A query can fail at three points: when it is submitted, while its rows
//! are read and decoded, and when the cursor is closed and asked for the
//! error its stream deferred. Each [`TestCase`] declares which of those
//! points must fail and the exact row sequence it must produce; the
//! harness runs the stages strictly in order and records every dimension
//! that disagrees in a [`Verdict`].
//!
//! ```text
//! FixtureController::setup
//!   for each case: submit -> drain -> finalize -> evaluate
//! FixtureController::teardown
//! ```
//!
//! The database is reached only through the `driver` traits, so the same
//! cases run against any backend that implements them.


pub mod case;
pub mod drain;
pub mod error;
pub mod evaluate;
pub mod finalize;
pub mod fixture;
pub mod outcome;
pub mod record;
pub mod report;
pub mod runner;
pub mod submit;
pub mod suite;

pub use case::{Expectations, Stage, TestCase};
pub use drain::{drain, Drained, RowScanError, ScanPolicy};
pub use error::{FixturePhase, HarnessError, HarnessResult, ScanError, StageError};
pub use evaluate::{evaluate, Mismatch, Verdict};
pub use finalize::finalize;
pub use fixture::{ColumnSpec, FixtureController, FixtureSpec, FixtureState};
pub use outcome::ExecutionOutcome;
pub use record::{FromRow, Record};
pub use report::RunReport;
pub use runner::{execute, run_case, run_cases, Collaborators, Harness, RunOptions};
pub use submit::{submit, Submission};

/// Convenient re-exports for suites.
pub mod prelude {
    pub use crate::suite::{query_context_cases, query_context_fixture, ErrorSurface};
    pub use crate::{
        Collaborators, FixtureSpec, Harness, Record, RunOptions, RunReport, ScanPolicy, Stage,
        TestCase,
    };
}
