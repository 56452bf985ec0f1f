//! In-process, strongly-consistent SQL service.
//!
//! [`Emulator`] implements every collaborator trait from the `driver`
//! crate against in-memory databases. Each database is a copy-on-write
//! snapshot behind a `tokio::sync::RwLock`: queries capture the snapshot
//! current at submission, while DDL batches and transactions build a new
//! snapshot and publish it only if every statement succeeded.
//!
//! Queries validate lazily by default, the way a streaming RPC driver
//! does: `query` always hands out a cursor, and analysis errors come back
//! from [`driver::RowCursor::err`] once the cursor was advanced or closed.
//! [`Validation::OnSubmit`] moves analysis into `query` itself.


mod analyze;
mod ast;
mod catalog;
mod cursor;
mod eval;
mod parser;

pub use cursor::EmulatorCursor;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::DatabaseId;
use driver::{
    Connection, Connector, DdlOperation, DriverError, DriverResult, RowCursor, SchemaAdmin,
    TransactionRunner,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::Value;

use analyze::{bind_constant, prepare};
use ast::{Expr, Statement};
use catalog::{Column, DatabaseState, Table};
use parser::parse_statement;

/// When a query is analyzed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validation {
    /// Analysis runs on the first `next` or on `close`; errors surface
    /// through the cursor.
    #[default]
    Deferred,
    /// Analysis runs inside `query`; errors are returned immediately.
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EmulatorOptions {
    pub validation: Validation,
}

impl EmulatorOptions {
    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

/// Handle to the emulated service. Cloning is cheap and shares state.
#[derive(Clone, Default)]
pub struct Emulator {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    options: EmulatorOptions,
    databases: RwLock<HashMap<DatabaseId, Arc<Database>>>,
    next_operation: AtomicU64,
}

struct Database {
    state: RwLock<Arc<DatabaseState>>,
    ddl_history: Mutex<Vec<String>>,
}

impl Emulator {
    pub fn new(options: EmulatorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                ..Inner::default()
            }),
        }
    }

    pub fn options(&self) -> EmulatorOptions {
        self.inner.options
    }

    /// Create an empty database.
    pub async fn create_database(&self, id: &DatabaseId) -> DriverResult<()> {
        let mut databases = self.inner.databases.write().await;
        if databases.contains_key(id) {
            return Err(DriverError::already_exists(format!(
                "Database already exists: {id}"
            )));
        }
        databases.insert(
            id.clone(),
            Arc::new(Database {
                state: RwLock::new(Arc::new(DatabaseState::default())),
                ddl_history: Mutex::new(Vec::new()),
            }),
        );
        info!(database = %id, "created database");
        Ok(())
    }

    /// Every DDL statement submitted to the database, in submission order,
    /// whether or not it was applied.
    pub async fn submitted_ddl(&self, id: &DatabaseId) -> DriverResult<Vec<String>> {
        let database = self.database(id).await?;
        let history = database.ddl_history.lock().await;
        Ok(history.clone())
    }

    pub async fn table_names(&self, id: &DatabaseId) -> DriverResult<Vec<String>> {
        let snapshot = self.snapshot(id).await?;
        Ok(snapshot.table_names())
    }

    pub async fn table_row_count(&self, id: &DatabaseId, table: &str) -> DriverResult<usize> {
        let snapshot = self.snapshot(id).await?;
        Ok(snapshot.table(table)?.len())
    }

    async fn database(&self, id: &DatabaseId) -> DriverResult<Arc<Database>> {
        self.inner
            .databases
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DriverError::not_found(format!("Database not found: {id}")))
    }

    async fn snapshot(&self, id: &DatabaseId) -> DriverResult<Arc<DatabaseState>> {
        let database = self.database(id).await?;
        let state = database.state.read().await;
        Ok(Arc::clone(&state))
    }
}

/// Schema change running on a spawned task.
pub struct EmulatorDdlOperation {
    name: String,
    handle: JoinHandle<DriverResult<()>>,
}

#[async_trait]
impl DdlOperation for EmulatorDdlOperation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn wait(self: Box<Self>) -> DriverResult<()> {
        let EmulatorDdlOperation { name, handle } = *self;
        handle.await.map_err(|err| {
            DriverError::aborted(format!("operation {name} did not complete: {err}"))
        })?
    }
}

#[async_trait]
impl SchemaAdmin for Emulator {
    async fn update_database_ddl(
        &self,
        database: &DatabaseId,
        statements: Vec<String>,
    ) -> DriverResult<Box<dyn DdlOperation>> {
        if statements.is_empty() {
            return Err(DriverError::invalid_argument("No DDL statements specified"));
        }
        let target = self.database(database).await?;
        target
            .ddl_history
            .lock()
            .await
            .extend(statements.iter().cloned());

        let id = self.inner.next_operation.fetch_add(1, Ordering::Relaxed);
        let name = format!("{database}/operations/ddl_{id}");
        debug!(operation = %name, count = statements.len(), "submitted schema change");

        let handle = tokio::spawn(async move { apply_schema_change(&target, statements).await });
        Ok(Box::new(EmulatorDdlOperation { name, handle }))
    }
}

async fn apply_schema_change(database: &Database, statements: Vec<String>) -> DriverResult<()> {
    let mut guard = database.state.write().await;
    let mut next = DatabaseState::clone(&guard);
    for sql in &statements {
        let statement = parse_statement(sql)?;
        if !statement.is_ddl() {
            return Err(DriverError::invalid_argument(format!(
                "Only DDL statements are allowed in a schema change: {sql}"
            )));
        }
        apply_ddl_statement(&mut next, statement)?;
    }
    *guard = Arc::new(next);
    Ok(())
}

fn apply_ddl_statement(state: &mut DatabaseState, statement: Statement) -> DriverResult<()> {
    match statement {
        Statement::CreateTable {
            name,
            columns,
            primary_key,
        } => {
            let columns = columns.into_iter().map(Column::from).collect();
            state.create_table(Table::try_new(&name, columns, &primary_key)?)?;
            info!(table = %name, "created table");
        }
        Statement::DropTable { name, if_exists } => {
            if state.drop_table(&name, if_exists)? {
                info!(table = %name, "dropped table");
            }
        }
        other => {
            return Err(DriverError::internal(format!(
                "not a schema statement: {other:?}"
            )))
        }
    }
    Ok(())
}

#[async_trait]
impl TransactionRunner for Emulator {
    async fn run_in_transaction(
        &self,
        database: &DatabaseId,
        statements: Vec<String>,
    ) -> DriverResult<u64> {
        let target = self.database(database).await?;
        let mut guard = target.state.write().await;
        let mut next = DatabaseState::clone(&guard);

        let mut affected = 0;
        for sql in &statements {
            match parse_statement(sql).and_then(|stmt| execute_dml(&mut next, stmt)) {
                Ok(count) => affected += count,
                Err(err) => {
                    warn!(error = %err, "transaction rolled back");
                    return Err(err);
                }
            }
        }

        *guard = Arc::new(next);
        debug!(affected, "transaction committed");
        Ok(affected)
    }
}

fn execute_dml(state: &mut DatabaseState, statement: Statement) -> DriverResult<u64> {
    let Statement::Insert {
        table,
        columns,
        rows,
    } = statement
    else {
        return Err(DriverError::invalid_argument(
            "Only INSERT statements are supported in a transaction",
        ));
    };

    let target = state.table_mut(&table)?;
    let width = target.columns().len();
    let positions = if columns.is_empty() {
        (0..width).collect::<Vec<_>>()
    } else {
        let mut positions = Vec::with_capacity(columns.len());
        for name in &columns {
            let idx = target.column_index(name).ok_or_else(|| {
                DriverError::not_found(format!("Column not found in table {table}: {name}"))
            })?;
            if positions.contains(&idx) {
                return Err(DriverError::invalid_argument(format!(
                    "Column {name} specified more than once"
                )));
            }
            positions.push(idx);
        }
        positions
    };

    let mut inserted = 0;
    for exprs in rows {
        if exprs.len() != positions.len() {
            return Err(DriverError::invalid_argument(format!(
                "Inserted row has wrong column count; Has {}, expected {}",
                exprs.len(),
                positions.len()
            )));
        }
        let mut values = vec![Value::Null; width];
        for (idx, expr) in positions.iter().zip(exprs) {
            values[*idx] = constant(expr)?;
        }
        target.insert(values)?;
        inserted += 1;
    }
    Ok(inserted)
}

fn constant(expr: Expr) -> DriverResult<Value> {
    eval::eval(&bind_constant(expr)?, &[])
}

#[async_trait]
impl Connector for Emulator {
    async fn open(&self, dsn: &str) -> DriverResult<Box<dyn Connection>> {
        let id: DatabaseId = dsn
            .parse()
            .map_err(|err: common::ConfigError| DriverError::invalid_argument(err.to_string()))?;
        let database = self.database(&id).await?;
        debug!(database = %id, "opened connection");
        Ok(Box::new(EmulatorConnection {
            database,
            validation: self.inner.options.validation,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Query connection bound to one database.
pub struct EmulatorConnection {
    database: Arc<Database>,
    validation: Validation,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for EmulatorConnection {
    async fn query(&self, sql: &str) -> DriverResult<Box<dyn RowCursor>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::failed_precondition("connection is closed"));
        }
        let snapshot = Arc::clone(&*self.database.state.read().await);
        let cursor = match self.validation {
            Validation::Deferred => EmulatorCursor::deferred(sql, snapshot),
            Validation::OnSubmit => EmulatorCursor::validated(prepare(&snapshot, sql)?),
        };
        Ok(Box::new(cursor))
    }

    async fn close(&self) -> DriverResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
