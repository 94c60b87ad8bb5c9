//! The bounded-deadline attempt loop for writes.

use manta_cql::{QueryResult, Session, StatementRequest};
use tokio::time::Instant;

use crate::error::TableError;

/// Executes `request` until it succeeds, a non-retryable error occurs, or
/// `deadline` passes. Only the store's transient write-timeout class is
/// retried, immediately and without backoff; the deadline bounds the whole
/// loop, not each attempt. A deadline that expires mid-flight aborts the
/// in-flight call.
pub(crate) async fn execute_with_deadline(
    session: &dyn Session,
    request: &StatementRequest,
    deadline: Instant,
    operation: &'static str,
    table: &str,
) -> Result<QueryResult, TableError> {
    let started = Instant::now();
    loop {
        let attempt = tokio::time::timeout_at(deadline, session.execute(request));
        match attempt.await {
            Err(_elapsed) => {
                return Err(TableError::Timeout {
                    operation,
                    table: table.to_string(),
                })
            }
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(error)) if error.is_write_timeout() => {
                log::debug!(
                    "{} on {} retrying after write timeout ({}), {:?} elapsed",
                    operation,
                    table,
                    error,
                    started.elapsed()
                );
                if Instant::now() >= deadline {
                    return Err(TableError::Timeout {
                        operation,
                        table: table.to_string(),
                    });
                }
            }
            Ok(Err(source)) => {
                log::debug!("{} on {} failure not retryable: {}", operation, table, source);
                return Err(TableError::Session {
                    operation,
                    table: table.to_string(),
                    source,
                });
            }
        }
    }
}
