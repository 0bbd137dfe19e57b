//! Timeout and single-retry wrapper for collaborator network calls.

use std::future::Future;

use tracing::warn;

use crate::config::NetworkConfig;
use crate::error::JanitorError;

/// Run `op` under the configured timeout, retrying once on a transient failure.
///
/// A timeout is reported as [`JanitorError::Network`] and is therefore
/// retriable. Non-transient errors are returned immediately.
///
/// # Errors
///
/// Returns the error of the last attempt.
///
/// # Examples
///
/// ```
/// use janitor_core::{with_retry, NetworkConfig};
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let value = rt
///     .block_on(with_retry(&NetworkConfig::default(), "ping", || async { Ok(7) }))
///     .unwrap();
/// assert_eq!(value, 7);
/// ```
pub async fn with_retry<T, F, Fut>(
    policy: &NetworkConfig,
    what: &str,
    mut op: F,
) -> Result<T, JanitorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JanitorError>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout(), op()).await {
            Ok(result) => result,
            Err(_) => Err(JanitorError::Network(format!(
                "{what} timed out after {}s",
                policy.timeout().as_secs()
            ))),
        };

        match result {
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(call = what, attempt, error = %e, "transient failure, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&NetworkConfig::default(), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(JanitorError::Network("connection reset".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_transient_failure() {
        let calls = AtomicU32::new(0);
        let policy = NetworkConfig {
            timeout_secs: 30,
            retries: 9,
        };
        let result: Result<(), _> = with_retry(&policy, "down", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(JanitorError::Network("503".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn api_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&NetworkConfig::default(), "post", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(JanitorError::GitHub("422 Unprocessable Entity".into())) }
        })
        .await;
        assert!(matches!(result, Err(JanitorError::GitHub(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let policy = NetworkConfig {
            timeout_secs: 30,
            retries: 0,
        };
        let result: Result<(), _> = with_retry(&policy, "once", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(JanitorError::Network("reset".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_network_error() {
        let policy = NetworkConfig {
            timeout_secs: 2,
            retries: 0,
        };
        let result: Result<(), _> = with_retry(&policy, "slow", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        match result {
            Err(JanitorError::Network(msg)) => assert!(msg.contains("slow timed out after 2s")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
