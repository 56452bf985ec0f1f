//! Schema and seed data prepared once per run.
//!
//! [`FixtureSpec`] describes the table and renders the Spanner-dialect
//! statements for it. [`FixtureController`] applies them through the admin
//! and transaction collaborators and guarantees the table is dropped at
//! most once.

use std::sync::Arc;

use common::DatabaseId;
use driver::{apply_ddl, SchemaAdmin, TransactionRunner};
use tracing::{debug, info, warn};
use types::{SqlType, Value};

use crate::error::{FixturePhase, HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: SqlType,
    /// Length bound for `STRING` columns; `None` renders as `MAX`.
    pub max_length: Option<usize>,
}

impl ColumnSpec {
    pub fn string(name: impl Into<String>, max_length: usize) -> Self {
        Self {
            name: name.into(),
            ty: SqlType::Text,
            max_length: Some(max_length),
        }
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: SqlType::Int,
            max_length: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: SqlType::Bool,
            max_length: None,
        }
    }

    fn ddl_type(&self) -> String {
        match (self.ty, self.max_length) {
            (SqlType::Text, Some(len)) => format!("STRING({len})"),
            (SqlType::Text, None) => "STRING(MAX)".to_string(),
            (ty, _) => ty.to_string(),
        }
    }
}

/// A table with its primary key and seed rows.
///
/// # Example
///
/// ```
/// use harness::{ColumnSpec, FixtureSpec};
///
/// let spec = FixtureSpec::new("Singers")
///     .column(ColumnSpec::string("Id", 36))
///     .column(ColumnSpec::int64("Age"))
///     .primary_key(["Id"])
///     .row(["s1".into(), 41i64.into()]);
///
/// assert_eq!(
///     spec.create_ddl(),
///     "CREATE TABLE Singers (\n\tId STRING(36),\n\tAge INT64\n) PRIMARY KEY (Id)"
/// );
/// assert_eq!(
///     spec.seed_dml().as_deref(),
///     Some(r#"INSERT INTO Singers (Id, Age) VALUES ("s1", 41)"#)
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSpec {
    table: String,
    columns: Vec<ColumnSpec>,
    primary_key: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl FixtureSpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn row(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn create_ddl(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("\t{} {}", c.name, c.ddl_type()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "CREATE TABLE {} (\n{}\n) PRIMARY KEY ({})",
            self.table,
            columns,
            self.primary_key.join(", ")
        )
    }

    pub fn drop_ddl(&self) -> String {
        format!("DROP TABLE {}", self.table)
    }

    /// One multi-row INSERT, or `None` when there is nothing to seed.
    pub fn seed_dml(&self) -> Option<String> {
        if self.rows.is_empty() {
            return None;
        }
        let columns = self
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let tuples = self
            .rows
            .iter()
            .map(|row| {
                let values = row.iter().map(sql_literal).collect::<Vec<_>>().join(", ");
                format!("({values})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table, columns, tuples
        ))
    }
}

/// GoogleSQL literal; strings are double-quoted.
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Text(text) => format!("\"{}\"", text.replace('"', "\"\"")),
        Value::Int(v) => v.to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Null => "NULL".to_string(),
    }
}

/// Lifecycle of the fixture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Absent,
    Created,
    Loaded,
    TornDown,
}

/// Creates, seeds and drops the fixture table.
pub struct FixtureController {
    spec: FixtureSpec,
    database: DatabaseId,
    admin: Arc<dyn SchemaAdmin>,
    writer: Arc<dyn TransactionRunner>,
    state: FixtureState,
}

impl FixtureController {
    pub fn new(
        spec: FixtureSpec,
        database: DatabaseId,
        admin: Arc<dyn SchemaAdmin>,
        writer: Arc<dyn TransactionRunner>,
    ) -> Self {
        Self {
            spec,
            database,
            admin,
            writer,
            state: FixtureState::Absent,
        }
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    /// Create the table and load the seed rows. On a load failure the
    /// table stays `Created` so that [`teardown`](Self::teardown) drops it.
    pub async fn setup(&mut self) -> HarnessResult<()> {
        if self.state != FixtureState::Absent {
            debug!(state = ?self.state, "fixture already set up");
            return Ok(());
        }

        let table = self.spec.table().to_string();
        apply_ddl(self.admin.as_ref(), &self.database, vec![self.spec.create_ddl()])
            .await
            .map_err(|source| HarnessError::Fixture {
                phase: FixturePhase::Create,
                table: table.clone(),
                source,
            })?;
        self.state = FixtureState::Created;
        debug!(%table, "fixture table created");

        if let Some(dml) = self.spec.seed_dml() {
            let affected = self
                .writer
                .run_in_transaction(&self.database, vec![dml])
                .await
                .map_err(|source| HarnessError::Fixture {
                    phase: FixturePhase::Load,
                    table: table.clone(),
                    source,
                })?;
            debug!(%table, affected, "fixture rows loaded");
        }
        self.state = FixtureState::Loaded;
        info!(%table, rows = self.spec.rows().len(), "fixture ready");
        Ok(())
    }

    /// Drop the table if this controller created it. Runs at most once;
    /// later calls and calls before a successful create do nothing.
    pub async fn teardown(&mut self) -> HarnessResult<()> {
        if !matches!(self.state, FixtureState::Created | FixtureState::Loaded) {
            return Ok(());
        }
        self.state = FixtureState::TornDown;

        let table = self.spec.table().to_string();
        apply_ddl(self.admin.as_ref(), &self.database, vec![self.spec.drop_ddl()])
            .await
            .map_err(|source| HarnessError::Fixture {
                phase: FixturePhase::Drop,
                table: table.clone(),
                source,
            })?;
        debug!(%table, "fixture table dropped");
        Ok(())
    }
}

impl Drop for FixtureController {
    fn drop(&mut self) {
        if matches!(self.state, FixtureState::Created | FixtureState::Loaded) {
            warn!(
                table = %self.spec.table(),
                "fixture controller dropped without teardown; table leaked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn query_context() -> FixtureSpec {
        FixtureSpec::new("TestQueryContext")
            .column(ColumnSpec::string("A", 1024))
            .column(ColumnSpec::string("B", 1024))
            .column(ColumnSpec::string("C", 1024))
            .primary_key(["A"])
            .row(["a1".into(), "b1".into(), "c1".into()])
            .row(["a2".into(), "b2".into(), "c2".into()])
    }

    #[test]
    fn renders_spanner_ddl() {
        assert_eq!(
            query_context().create_ddl(),
            "CREATE TABLE TestQueryContext (\n\tA STRING(1024),\n\tB STRING(1024),\n\tC STRING(1024)\n) PRIMARY KEY (A)"
        );
        assert_eq!(query_context().drop_ddl(), "DROP TABLE TestQueryContext");
    }

    #[test]
    fn renders_double_quoted_insert() {
        assert_eq!(
            query_context().seed_dml().unwrap(),
            r#"INSERT INTO TestQueryContext (A, B, C) VALUES ("a1", "b1", "c1"), ("a2", "b2", "c2")"#
        );
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(sql_literal(&Value::from("say \"hi\"")), r#""say ""hi""""#);
        assert_eq!(sql_literal(&Value::Bool(true)), "TRUE");
        assert_eq!(sql_literal(&Value::Null), "NULL");
    }

    #[test]
    fn empty_fixture_has_no_seed() {
        let spec = FixtureSpec::new("T")
            .column(ColumnSpec::int64("K"))
            .column(ColumnSpec::bool("Flag"))
            .primary_key(["K"]);
        assert!(spec.seed_dml().is_none());
        assert!(spec.create_ddl().contains("Flag BOOL"));
    }
}
