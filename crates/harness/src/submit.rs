use std::fmt;

use driver::{Connection, DriverError, RowCursor};
use tracing::debug;

/// Result of handing a query to the connection: the first failure point.
pub enum Submission {
    Submitted(Box<dyn RowCursor>),
    Failed(DriverError),
}

impl Submission {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Submission::Submitted(_))
    }

    pub fn error(&self) -> Option<&DriverError> {
        match self {
            Submission::Submitted(_) => None,
            Submission::Failed(err) => Some(err),
        }
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Submission::Submitted(cursor) => f
                .debug_tuple("Submitted")
                .field(&cursor.columns())
                .finish(),
            Submission::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// Submit one query. Empty and malformed text is passed through as-is; no
/// retries.
pub async fn submit(connection: &dyn Connection, query: &str) -> Submission {
    match connection.query(query).await {
        Ok(cursor) => {
            debug!(query, "query submitted");
            Submission::Submitted(cursor)
        }
        Err(err) => {
            debug!(query, error = %err, "query rejected at submission");
            Submission::Failed(err)
        }
    }
}
