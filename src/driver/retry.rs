use std::future::Future;
use tracing::warn;

use super::JoinError;

/// Runs `op`, retrying up to `retries` extra times while it fails with a
/// retryable [`JoinError`]. Non-retryable errors are returned immediately.
pub async fn with_retries<T, F, Fut>(retries: u32, label: &str, mut op: F) -> Result<T, JoinError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JoinError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!("{} failed ({}), retrying ({}/{})", label, err, attempt, retries);
            }
            Err(err) => return Err(err),
        }
    }
}
