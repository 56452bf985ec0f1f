//! End-to-end runs of the query-context suite against the in-process
//! emulator.

use anyhow::Result;
use async_trait::async_trait;
use common::{Config, DatabaseId};
use driver::{Connector, DdlOperation, DriverError, DriverResult, SchemaAdmin};
use emulator::{Emulator, EmulatorOptions, Validation};
use harness::prelude::*;
use harness::{
    execute, run_cases, ColumnSpec, FixtureController, FixturePhase, FixtureState, HarnessError,
    Mismatch,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use types::Value;

fn config() -> Config {
    Config::builder().database("harness").build()
}

async fn emulator(validation: Validation) -> Result<Emulator> {
    let emulator = Emulator::new(EmulatorOptions::default().with_validation(validation));
    emulator.create_database(&config().database_id()).await?;
    Ok(emulator)
}

fn harness_for(emulator: &Emulator) -> Harness {
    Harness::new(config(), Collaborators::from_backend(emulator.clone()))
}

#[tokio::test]
async fn suite_passes_with_deferred_validation() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let report = harness_for(&emulator)
        .run(
            &query_context_fixture(),
            &query_context_cases(ErrorSurface::Close),
        )
        .await?;

    assert_eq!(report.verdicts.len(), 8);
    assert!(report.passed(), "{}", report.summary());
    assert!(!report.is_dirty());

    // Created once, dropped once.
    let ddl = emulator.submitted_ddl(&config().database_id()).await?;
    assert_eq!(ddl.len(), 2);
    assert!(ddl[0].starts_with("CREATE TABLE TestQueryContext"));
    assert_eq!(ddl[1], "DROP TABLE TestQueryContext");
    assert!(emulator
        .table_names(&config().database_id())
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn suite_passes_with_eager_validation() -> Result<()> {
    let emulator = emulator(Validation::OnSubmit).await?;
    let report = harness_for(&emulator)
        .run(
            &query_context_fixture(),
            &query_context_cases(ErrorSurface::Submit),
        )
        .await?;
    assert!(report.passed(), "{}", report.render(Default::default()));
    Ok(())
}

#[tokio::test]
async fn submit_errors_leave_later_stages_clean() -> Result<()> {
    let emulator = emulator(Validation::OnSubmit).await?;
    let conn = emulator.open(&config().dsn()).await?;

    for query in ["", "SELECT SELECT * FROM TestQueryContext", "SELECT * FROM NonExistent"] {
        let outcome = execute::<Record>(conn.as_ref(), query, ScanPolicy::Continue).await;
        assert!(outcome.submit_error.is_some(), "{query:?}");
        assert!(outcome.rows.is_empty());
        assert!(outcome.scan_errors.is_empty());
        assert_eq!(outcome.close_error, None);
    }
    Ok(())
}

#[tokio::test]
async fn wrong_error_surface_is_reported_per_stage() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let report = harness_for(&emulator)
        .run(
            &query_context_fixture(),
            &query_context_cases(ErrorSurface::Submit),
        )
        .await?;

    let failures = report.failures();
    assert_eq!(failures.len(), 3);
    for verdict in failures {
        assert_eq!(verdict.mismatches.len(), 2, "{verdict}");
        assert_eq!(
            verdict.mismatches[0],
            Mismatch::MissingError {
                stage: Stage::Submit
            }
        );
        assert!(matches!(
            verdict.mismatches[1],
            Mismatch::UnexpectedError {
                stage: Stage::Close,
                ..
            }
        ));
    }
    Ok(())
}

#[tokio::test]
async fn rerunning_cases_on_unchanged_fixture_is_idempotent() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let backend = Arc::new(emulator.clone());
    let mut fixture = FixtureController::new(
        query_context_fixture(),
        config().database_id(),
        backend.clone(),
        backend,
    );
    fixture.setup().await?;
    assert_eq!(fixture.state(), FixtureState::Loaded);

    let conn = emulator.open(&config().dsn()).await?;
    let cases = query_context_cases(ErrorSurface::Close);
    let first = run_cases(conn.as_ref(), &cases, RunOptions::default()).await;
    let second = run_cases(conn.as_ref(), &cases, RunOptions::default()).await;
    assert_eq!(first, second);
    assert!(first.iter().all(|v| v.passed()));

    fixture.teardown().await?;
    fixture.teardown().await?;
    assert_eq!(fixture.state(), FixtureState::TornDown);
    let ddl = emulator.submitted_ddl(&config().database_id()).await?;
    assert_eq!(ddl.iter().filter(|s| s.starts_with("DROP")).count(), 1);
    Ok(())
}

#[tokio::test]
async fn create_failure_aborts_without_teardown() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    driver::apply_ddl(
        &emulator,
        &config().database_id(),
        vec!["CREATE TABLE TestQueryContext (X INT64) PRIMARY KEY (X)".into()],
    )
    .await?;

    let err = harness_for(&emulator)
        .run(
            &query_context_fixture(),
            &query_context_cases(ErrorSurface::Close),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Fixture {
            phase: FixturePhase::Create,
            ..
        }
    ));

    let ddl = emulator.submitted_ddl(&config().database_id()).await?;
    assert_eq!(ddl.len(), 2);
    assert!(ddl.iter().all(|s| s.starts_with("CREATE")));
    Ok(())
}

#[tokio::test]
async fn load_failure_still_drops_the_table() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let fixture = query_context_fixture().row(["a1".into(), "dup".into(), "dup".into()]);

    let err = harness_for(&emulator)
        .run(&fixture, &query_context_cases(ErrorSurface::Close))
        .await
        .unwrap_err();
    match err {
        HarnessError::Fixture { phase, table, .. } => {
            assert_eq!(phase, FixturePhase::Load);
            assert_eq!(table, "TestQueryContext");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(emulator
        .table_names(&config().database_id())
        .await?
        .is_empty());
    let ddl = emulator.submitted_ddl(&config().database_id()).await?;
    assert_eq!(ddl.last().map(String::as_str), Some("DROP TABLE TestQueryContext"));
    Ok(())
}

#[tokio::test]
async fn connect_failure_tears_down_and_reports_dsn() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let unreachable = Emulator::default();
    let collaborators = Collaborators {
        admin: Arc::new(emulator.clone()),
        writer: Arc::new(emulator.clone()),
        connector: Arc::new(unreachable),
    };

    let err = Harness::new(config(), collaborators)
        .run(
            &query_context_fixture(),
            &query_context_cases(ErrorSurface::Close),
        )
        .await
        .unwrap_err();
    match err {
        HarnessError::Connect { dsn, source } => {
            assert_eq!(dsn, config().dsn());
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(emulator
        .table_names(&config().database_id())
        .await?
        .is_empty());
    Ok(())
}

/// Admin that applies everything except DROP statements.
struct DropRefusingAdmin(Emulator);

#[async_trait]
impl SchemaAdmin for DropRefusingAdmin {
    async fn update_database_ddl(
        &self,
        database: &DatabaseId,
        statements: Vec<String>,
    ) -> DriverResult<Box<dyn DdlOperation>> {
        if statements.iter().any(|s| s.starts_with("DROP")) {
            return Err(DriverError::failed_precondition("schema change rejected"));
        }
        self.0.update_database_ddl(database, statements).await
    }
}

#[tokio::test]
async fn teardown_failure_marks_run_dirty() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let collaborators = Collaborators {
        admin: Arc::new(DropRefusingAdmin(emulator.clone())),
        writer: Arc::new(emulator.clone()),
        connector: Arc::new(emulator.clone()),
    };

    let report = Harness::new(config(), collaborators)
        .run(
            &query_context_fixture(),
            &query_context_cases(ErrorSurface::Close),
        )
        .await?;

    assert!(report.verdicts.iter().all(|v| v.passed()));
    assert!(report.is_dirty());
    assert!(!report.passed());
    assert!(report
        .teardown_error
        .as_deref()
        .is_some_and(|e| e.contains("fixture drop failed")));
    assert_eq!(
        emulator.table_names(&config().database_id()).await?,
        vec!["TestQueryContext"]
    );
    Ok(())
}

fn measured_fixture() -> FixtureSpec {
    FixtureSpec::new("Measured")
        .column(ColumnSpec::string("A", 16))
        .column(ColumnSpec::string("B", 16))
        .column(ColumnSpec::string("C", 16))
        .column(ColumnSpec::int64("D"))
        .primary_key(["A"])
        .row(["a1".into(), "b1".into(), "c1".into(), 1i64.into()])
        .row(["a2".into(), "b2".into(), "c2".into(), 0i64.into()])
        .row(["a3".into(), "b3".into(), "c3".into(), 2i64.into()])
}

#[tokio::test]
async fn mid_stream_failure_delivers_earlier_rows() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let cases = vec![
        TestCase::new(
            "divide by zero on second row",
            "SELECT A, B, C FROM Measured WHERE 10 / D > 0",
        )
        .want_rows([Record::new("a1", "b1", "c1")])
        .expect_close_error(),
        TestCase::new(
            "filter out the zero",
            "SELECT A, B, C FROM Measured WHERE D != 0 ORDER BY D DESC",
        )
        .want_rows([Record::new("a3", "b3", "c3"), Record::new("a1", "b1", "c1")]),
    ];

    let report = harness_for(&emulator).run(&measured_fixture(), &cases).await?;
    assert!(report.passed(), "{}", report.summary());
    Ok(())
}

#[tokio::test]
async fn scan_policy_controls_how_far_decoding_goes() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let backend = Arc::new(emulator.clone());
    let mut fixture = FixtureController::new(
        measured_fixture(),
        config().database_id(),
        backend.clone(),
        backend,
    );
    fixture.setup().await?;
    let conn = emulator.open(&config().dsn()).await?;

    let query = "SELECT A, B, D FROM Measured";
    let cont = execute::<Record>(conn.as_ref(), query, ScanPolicy::Continue).await;
    assert_eq!(cont.scan_errors.len(), 3);
    assert_eq!(
        cont.rows,
        vec![
            Record::new("a1", "b1", ""),
            Record::new("a2", "b2", ""),
            Record::new("a3", "b3", ""),
        ]
    );
    assert_eq!(cont.decoded_rows(), 0);
    assert_eq!(cont.close_error, None);

    let halt = execute::<Record>(conn.as_ref(), query, ScanPolicy::Halt).await;
    assert_eq!(halt.scan_errors.len(), 1);
    assert_eq!(halt.scan_errors[0].row, 0);
    assert_eq!(halt.rows, vec![Record::new("a1", "b1", "")]);

    let case = TestCase::new("wrong column type", query)
        .want_rows([Record::new("a1", "b1", "")])
        .expect_scan_error();
    let options = RunOptions {
        scan_policy: ScanPolicy::Halt,
    };
    let verdicts = run_cases(conn.as_ref(), &[case], options).await;
    assert!(verdicts[0].passed(), "{}", verdicts[0]);

    fixture.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn rows_that_decode_fail_a_case_expecting_scan_errors() -> Result<()> {
    let emulator = emulator(Validation::Deferred).await?;
    let fixture = FixtureSpec::new("Sparse")
        .column(ColumnSpec::string("A", 16))
        .column(ColumnSpec::string("B", 16))
        .column(ColumnSpec::string("C", 16))
        .primary_key(["A"])
        .row(["a1".into(), "b1".into(), "c1".into()])
        .row(["a2".into(), "b2".into(), Value::Null]);
    let cases = vec![
        TestCase::new("null column on one row", "SELECT A, B, C FROM Sparse")
            .want_rows([Record::new("a1", "b1", "c1"), Record::new("a2", "b2", "")])
            .expect_scan_error(),
        TestCase::new("null column on every row", "SELECT A, B, C FROM Sparse WHERE C IS NULL")
            .want_rows([Record::new("a2", "b2", "")])
            .expect_scan_error(),
    ];

    let report = harness_for(&emulator).run(&fixture, &cases).await?;
    assert_eq!(
        report.verdicts[0].mismatches,
        vec![Mismatch::PartialScan {
            failed_rows: 1,
            ok_rows: 1
        }]
    );
    assert!(report.verdicts[1].passed(), "{}", report.verdicts[1]);
    Ok(())
}
