use std::future::Future;
use std::time::Duration;

use sentinel_core::SentinelResult;
use tracing::{info, warn};

/// Retry a startup connection a bounded number of times with a fixed delay.
///
/// Returns the last error once `attempts` are exhausted. The caller decides
/// whether that is fatal.
pub async fn connect_with_retry<T, F, Fut>(
    what: &str,
    attempts: u32,
    delay: Duration,
    mut connect: F,
) -> SentinelResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SentinelResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} 连接成功 (第{}次尝试)", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "{} 连接失败 (第{}/{}次尝试): {}，{}秒后重试",
                    what,
                    attempt,
                    attempts,
                    e,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::SentinelError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let started = tokio::time::Instant::now();
        let value = connect_with_retry("test", 10, Duration::from_secs(2), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SentinelError::Network("refused".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_bounded_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: SentinelResult<()> =
            connect_with_retry("test", 10, Duration::from_secs(2), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SentinelError::Network("refused".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }
}
