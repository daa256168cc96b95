//! Retry policy used for AI provider calls and persistence writes.
//!
//! Each provider family gets a fixed delay schedule rather than an
//! exponential-backoff formula, mirroring the explicit per-call sleep lists
//! used upstream: most providers retry `[2s, 4s, 8s]`, the Grok family
//! retries fast with `[0.5s, 0.5s]`, and persistence writes retry
//! `[1s, 2s, 4s]`.

use std::time::Duration;

use tracing::warn;

/// A fixed schedule of retry delays. `max_attempts` is `delays.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Builds a policy from an explicit delay schedule. `delays` may be
    /// empty, meaning "try once, never retry".
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Default schedule for most vision providers: 3 retries after the
    /// first attempt, waiting 2s, 4s, then 8s between them.
    #[must_use]
    pub fn provider_default() -> Self {
        Self::new(vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ])
    }

    /// Schedule for the Grok provider family: 3 attempts total, waiting
    /// 0.5s between each.
    #[must_use]
    pub fn grok() -> Self {
        Self::new(vec![
            Duration::from_millis(500),
            Duration::from_millis(500),
        ])
    }

    /// Schedule for repository/persistence writes: 4 attempts total,
    /// waiting 1s, 2s, then 4s.
    #[must_use]
    pub fn persistence() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }

    /// Total number of attempts this policy allows, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// The delay to wait after attempt `attempt` (0-indexed) before
    /// retrying, or `None` if `attempt` was the last allowed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }
}

/// Runs `op` up to `policy.max_attempts()` times, sleeping the configured
/// delay between attempts, and returning the first success or the final
/// error.
///
/// `op` is called fresh on every attempt since most operations (an HTTP
/// request, a database write) can't be meaningfully retried from a captured
/// future.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(policy, label, |_| true, op).await
}

/// Like [`with_retry`], but only retries errors for which `should_retry`
/// returns true; anything else is returned immediately. Provider dispatch
/// uses this with [`is_retryable_http_marker`] so that permanent failures
/// (auth errors, content blocks, parse failures) fall through to the next
/// provider without burning the retry schedule.
pub async fn with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !should_retry(&err) => return Err(err),
            Err(err) => match policy.delay_for(attempt) {
                Some(delay) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts(),
                        %label,
                        error = %err,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
        }
    }
}

/// Heuristic check for whether an error string represents a retryable HTTP
/// condition (rate limiting or transient server failure).
#[must_use]
pub fn is_retryable_http_marker(err_str: &str) -> bool {
    err_str.contains("429") || err_str.contains("500") || err_str.contains("503")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn provider_default_has_three_retries() {
        let policy = RetryPolicy::provider_default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(0), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_for(3), None);
    }

    #[test]
    fn grok_has_two_half_second_delays() {
        let policy = RetryPolicy::grok();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
    }

    #[test]
    fn zero_delay_policy_tries_once() {
        let policy = RetryPolicy::new(vec![]);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_succeeds_after_transient_failures() {
        let policy = RetryPolicy::provider_default();
        let calls = AtomicUsize::new(0);
        let result: Result<&str, &str> = with_retry(&policy, "test-op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(vec![Duration::from_millis(1)]);
        let calls = AtomicUsize::new(0);
        let result: Result<&str, &str> = with_retry(&policy, "test-op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err("always fails") }
        })
        .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retryable_http_marker_detection() {
        assert!(is_retryable_http_marker("HTTP 429 Too Many Requests"));
        assert!(is_retryable_http_marker("server returned 503"));
        assert!(!is_retryable_http_marker("HTTP 401 Unauthorized"));
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_if_returns_non_retryable_error_immediately() {
        let policy = RetryPolicy::provider_default();
        let calls = AtomicUsize::new(0);
        let result: Result<&str, &str> = with_retry_if(
            &policy,
            "test-op",
            |e: &&str| e.contains("503"),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("HTTP 401 Unauthorized") }
            },
        )
        .await;
        assert_eq!(result, Err("HTTP 401 Unauthorized"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
