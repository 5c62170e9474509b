//! Redis connection setup

use crate::backoff::Backoff;
use crate::error::StreamError;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

/// Open a connection manager and verify it with `PING`.
pub async fn connect(url: &str) -> Result<ConnectionManager, StreamError> {
    let client = redis::Client::open(url)
        .map_err(|e| StreamError::Config(format!("invalid Redis URL: {}", e)))?;

    let mut conn = ConnectionManager::new(client)
        .await
        .map_err(|e| StreamError::connection(e.to_string()))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| StreamError::connection(e.to_string()))?;

    Ok(conn)
}

/// Connect with bounded retries.
///
/// Gives up with the last connection error after `max_attempts` tries.
pub async fn connect_with_retry(
    url: &str,
    max_attempts: u32,
    backoff: Backoff,
) -> Result<ConnectionManager, StreamError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect(url).await {
            Ok(conn) => {
                info!(attempt, "Connected to Redis");
                return Ok(conn);
            }
            Err(e @ StreamError::Config(_)) => return Err(e),
            Err(e) if attempt >= max_attempts => {
                warn!(attempt, error = %e, "Giving up connecting to Redis");
                return Err(e);
            }
            Err(e) => {
                let delay = backoff.delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Redis connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
