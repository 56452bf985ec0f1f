//! Collaborator contracts consumed by the query harness.
//!
//! The harness never talks to a database directly. It goes through three
//! black-box surfaces:
//!
//! - [`SchemaAdmin`] applies DDL as a long-running [`DdlOperation`]
//! - [`TransactionRunner`] applies a batch of DML all-or-nothing
//! - [`Connector`] opens a [`Connection`] whose queries yield a [`RowCursor`]
//!
//! The cursor surface mirrors a `database/sql` style driver: advance with
//! [`RowCursor::next`], read the current row, close, then ask for the error
//! the stream recorded. Implementations may report a failing query lazily,
//! so a query can be accepted, stream zero rows and only report its error
//! from [`RowCursor::err`].
//!
//! # Example
//!
//! ```no_run
//! use driver::{Connector, DriverResult};
//!
//! async fn count_rows(connector: &dyn Connector, dsn: &str) -> DriverResult<usize> {
//!     let conn = connector.open(dsn).await?;
//!     let mut rows = conn.query("SELECT * FROM Singers").await?;
//!     let mut count = 0;
//!     while rows.next().await {
//!         count += 1;
//!     }
//!     rows.close().await?;
//!     match rows.err() {
//!         Some(err) => Err(err.clone()),
//!         None => Ok(count),
//!     }
//! }
//! ```

mod error;

pub use error::{DriverError, DriverResult, ErrorCode};

use async_trait::async_trait;
use common::{DatabaseId, Row};

/// Schema administration channel.
#[async_trait]
pub trait SchemaAdmin: Send + Sync {
    /// Submit DDL statements. The change is durable only once the returned
    /// operation has been waited on successfully.
    async fn update_database_ddl(
        &self,
        database: &DatabaseId,
        statements: Vec<String>,
    ) -> DriverResult<Box<dyn DdlOperation>>;
}

/// Handle to a schema change that completes asynchronously.
#[async_trait]
pub trait DdlOperation: Send {
    /// Server-assigned operation name.
    fn name(&self) -> &str;

    /// Block until the schema change finished, returning its final status.
    async fn wait(self: Box<Self>) -> DriverResult<()>;
}

/// Transactional write channel.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    /// Apply every DML statement in one read-write transaction. Either all
    /// statements commit or none do. Returns the total affected row count.
    async fn run_in_transaction(
        &self,
        database: &DatabaseId,
        statements: Vec<String>,
    ) -> DriverResult<u64>;
}

/// Opens logical query connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, dsn: &str) -> DriverResult<Box<dyn Connection>>;
}

/// A logical, read-only query connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Submit a query. An `Err` means the statement was rejected before any
    /// row could stream.
    async fn query(&self, sql: &str) -> DriverResult<Box<dyn RowCursor>>;

    /// Release the connection. Later queries fail.
    async fn close(&self) -> DriverResult<()>;
}

/// Streaming result of a submitted query.
#[async_trait]
pub trait RowCursor: Send {
    /// Column labels of the result. Empty until the query has been validated.
    fn columns(&self) -> &[String];

    /// Advance to the next row. Returns false once the stream is exhausted,
    /// failed, or the cursor was closed.
    async fn next(&mut self) -> bool;

    /// Row produced by the last successful [`RowCursor::next`].
    fn current(&self) -> Option<&Row>;

    /// Close the cursor. Idempotent.
    async fn close(&mut self) -> DriverResult<()>;

    /// Error recorded by the stream, if any. Only authoritative after the
    /// stream was exhausted or the cursor closed.
    fn err(&self) -> Option<&DriverError>;
}

/// Apply DDL and block until the schema change is complete.
pub async fn apply_ddl(
    admin: &dyn SchemaAdmin,
    database: &DatabaseId,
    statements: Vec<String>,
) -> DriverResult<()> {
    let operation = admin.update_database_ddl(database, statements).await?;
    operation.wait().await
}
