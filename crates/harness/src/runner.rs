//! Run loop: fixture setup, the three stages per case, teardown.

use std::fmt::Debug;
use std::sync::Arc;

use common::Config;
use driver::{Connection, Connector, SchemaAdmin, TransactionRunner};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::case::TestCase;
use crate::drain::{drain, ScanPolicy};
use crate::error::{HarnessError, HarnessResult};
use crate::evaluate::{evaluate, Verdict};
use crate::finalize::finalize;
use crate::fixture::{FixtureController, FixtureSpec};
use crate::outcome::ExecutionOutcome;
use crate::record::FromRow;
use crate::report::RunReport;
use crate::submit::submit;

/// The black-box services a run depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub admin: Arc<dyn SchemaAdmin>,
    pub writer: Arc<dyn TransactionRunner>,
    pub connector: Arc<dyn Connector>,
}

impl Collaborators {
    /// Use one backend for all three roles.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: SchemaAdmin + TransactionRunner + Connector + 'static,
    {
        let shared = Arc::new(backend);
        Self {
            admin: shared.clone(),
            writer: shared.clone(),
            connector: shared,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub scan_policy: ScanPolicy,
}

pub struct Harness {
    config: Config,
    collaborators: Collaborators,
    options: RunOptions,
}

impl Harness {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prepare the fixture, run every case in order, then drop the fixture.
    ///
    /// Setup and connection failures abort the run. A failed teardown does
    /// not; it is carried in the report, which is then marked dirty.
    pub async fn run<R>(&self, fixture: &FixtureSpec, cases: &[TestCase<R>]) -> HarnessResult<RunReport>
    where
        R: FromRow + PartialEq + Debug,
    {
        let mut controller = FixtureController::new(
            fixture.clone(),
            self.config.database_id(),
            self.collaborators.admin.clone(),
            self.collaborators.writer.clone(),
        );

        if let Err(err) = controller.setup().await {
            error!(error = %err, "fixture setup failed");
            if let Err(teardown_err) = controller.teardown().await {
                warn!(error = %teardown_err, "cleanup after failed setup also failed");
            }
            return Err(err);
        }

        let dsn = self.config.dsn();
        let connection = match self.collaborators.connector.open(&dsn).await {
            Ok(connection) => connection,
            Err(source) => {
                error!(%dsn, error = %source, "failed to open connection");
                if let Err(teardown_err) = controller.teardown().await {
                    warn!(error = %teardown_err, "fixture teardown failed");
                }
                return Err(HarnessError::Connect { dsn, source });
            }
        };

        let verdicts = run_cases(connection.as_ref(), cases, self.options).await;

        if let Err(err) = connection.close().await {
            warn!(error = %err, "failed to close connection");
        }

        let teardown_error = match controller.teardown().await {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "fixture teardown failed; run is dirty");
                Some(err.to_string())
            }
        };

        let report = RunReport::new(verdicts, teardown_error);
        info!(summary = %report.summary(), "run finished");
        Ok(report)
    }
}

/// Run cases one after another on an open connection.
pub async fn run_cases<R>(
    connection: &dyn Connection,
    cases: &[TestCase<R>],
    options: RunOptions,
) -> Vec<Verdict>
where
    R: FromRow + PartialEq + Debug,
{
    let mut verdicts = Vec::with_capacity(cases.len());
    for case in cases {
        verdicts.push(run_case(connection, case, options).await);
    }
    verdicts
}

/// Submit, drain and finalize one case, then evaluate it.
pub async fn run_case<R>(connection: &dyn Connection, case: &TestCase<R>, options: RunOptions) -> Verdict
where
    R: FromRow + PartialEq + Debug,
{
    let outcome = execute(connection, case.query(), options.scan_policy).await;
    let verdict = evaluate(case, &outcome);
    if verdict.passed() {
        info!(case = case.name(), "case passed");
    } else {
        info!(case = case.name(), verdict = %verdict, "case failed");
    }
    verdict
}

/// Run a query through all three stages. Finalize always runs, even after
/// a failed submission.
pub async fn execute<R: FromRow>(
    connection: &dyn Connection,
    query: &str,
    policy: ScanPolicy,
) -> ExecutionOutcome<R> {
    let mut submission = submit(connection, query).await;
    let submit_error = submission.error().cloned();
    let drained = drain(&mut submission, policy).await;
    let close_error = finalize(submission).await;
    debug!(
        submitted = submit_error.is_none(),
        rows = drained.rows.len(),
        closed_with_error = close_error.is_some(),
        "query lifecycle complete"
    );
    ExecutionOutcome::new(submit_error, drained, close_error)
}
