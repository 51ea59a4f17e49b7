//! 共通リトライユーティリティ
//!
//! CDNアップロードとCMS登録で同じ方針を使う:
//! 最大3回、即時リトライ（バックオフなし）、回復不能エラーは即座に返す。

use std::future::Future;

use tracing::warn;

use crate::error::ScraperError;

/// リトライ上限
pub const MAX_ATTEMPTS: u32 = 3;

/// `op` を最大 `MAX_ATTEMPTS` 回実行する。
/// `is_retryable()` が偽のエラーはその場で返す。
pub async fn bounded_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut last_error = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if attempt < MAX_ATTEMPTS {
                    warn!(
                        "{}: attempt {}/{} failed, retrying: {}",
                        label, attempt, MAX_ATTEMPTS, e
                    );
                } else {
                    warn!(
                        "{}: attempt {}/{} failed, giving up: {}",
                        label, attempt, MAX_ATTEMPTS, e
                    );
                }
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| ScraperError::Timeout(format!("{}: リトライ上限到達", label))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);

        let result = bounded_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(ScraperError::Upload(format!("transient {}", n)))
                } else {
                    Ok("hosted")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "hosted");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_all_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = bounded_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScraperError::Upload("always down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_fatal_error_returns_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = bounded_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ScraperError::Publish {
                    status: 400,
                    body: "ValidationError".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
