use crate::error::AnalyzerError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

pub const RETRY_DELAY_MS: u64 = 1000;

/// Run `op` up to `max_attempts` times, retrying only retryable errors.
///
/// The delay grows linearly with the attempt number. `max_attempts` of 0 or 1
/// means a single attempt.
pub async fn retry<F, Fut, T>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, AnalyzerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalyzerError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                warn!("Attempt {} failed: {}. Retrying...", attempt, e);
                sleep(base_delay * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    error!("All {} attempts failed: {}", attempt, e);
                }
                return Err(e);
            }
        }
    }
}

/// Keep at most `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry(3, Duration::from_millis(1), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 2 {
                Err(AnalyzerError::transport(Some(503), "busy"))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_response_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry(5, Duration::from_millis(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AnalyzerError::ProviderResponse("missing field".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_by_default() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry(0, Duration::from_millis(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AnalyzerError::transport(None, "reset"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 0), "");
    }
}
