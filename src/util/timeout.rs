//! Deadline for establishing a backend connection.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ParleyError;

/// Run `future` to completion or fail with [`ParleyError::Timeout`] once
/// `limit` passes. `operation` names the step in the log line.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, future: F) -> Result<T, ParleyError>
where
    F: Future<Output = Result<T, ParleyError>>,
{
    let Ok(result) = tokio::time::timeout(limit, future).await else {
        let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        warn!(operation, limit_ms, "Backend step timed out");
        return Err(ParleyError::Timeout(limit_ms));
    };
    result
}
