use driver::DriverError;
use tracing::debug;

use crate::submit::Submission;

/// Close the cursor and report the error the stream deferred, falling back
/// to a failure of `close` itself. A failed submission has nothing to close.
pub async fn finalize(submission: Submission) -> Option<DriverError> {
    let mut cursor = match submission {
        Submission::Submitted(cursor) => cursor,
        Submission::Failed(_) => return None,
    };

    let closed = cursor.close().await;
    let deferred = cursor.err().cloned();
    if let (Some(_), Err(close_err)) = (&deferred, &closed) {
        debug!(error = %close_err, "close failed after a stream error; keeping the stream error");
    }

    let error = deferred.or_else(|| closed.err());
    if let Some(err) = &error {
        debug!(error = %err, "cursor finalized with error");
    }
    error
}
