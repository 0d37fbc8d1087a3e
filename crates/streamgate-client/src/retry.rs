//! Retry logic with exponential backoff.
//!
//! Handles transient failures when calling the streaming service over
//! HTTP. The fetch endpoint is a throttled method, so throttling
//! responses back off the same way transport failures do.
//!
//! ## Retryable vs Non-Retryable Errors
//!
//! **Retryable** (transient failures):
//! - `Throttled`: HTTP 429 from the fetch endpoint
//! - `Transport`: connect/DNS/timeout failures that never reached the service
//! - `Service` with a 5xx status: the service is temporarily unhealthy
//!
//! **Non-Retryable** (permanent failures):
//! - `Service` with a 4xx status: the request won't succeed on retry
//! - `CursorCreation`: handled at the cycle level by the consume loop
//! - `InvalidResponse`, `Config`: bugs or misconfiguration

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::StreamApi;
use crate::cursor::{Cursor, GroupCursorDetails};
use crate::error::ClientError;
use crate::messages::MessageBatch;

/// Retry policy configuration for exponential backoff.
///
/// Backoff grows as `initial_backoff * multiplier^attempt`, capped at
/// `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom settings.
    pub fn new(
        max_retries: usize,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Calculate backoff duration for a given attempt number (0-indexed).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }

    /// Check if an error is retryable.
    pub fn is_retryable(&self, error: &ClientError) -> bool {
        match error {
            ClientError::Throttled => true,
            ClientError::Transport(_) => true,
            ClientError::Service { status, .. } => *status >= 500,

            ClientError::CursorCreation(_) => false,
            ClientError::InvalidResponse(_) => false,
            ClientError::Config(_) => false,
        }
    }
}

/// Retry an operation with exponential backoff.
///
/// Non-retryable errors are returned immediately; retryable errors are
/// retried up to `max_retries` times with growing delays, and the last
/// error is returned once retries are exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    warn!(error = %error, "Non-retryable error, giving up");
                    return Err(error);
                }

                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "Max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis(),
                    error = %error,
                    "Retryable error, backing off"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Retry an operation with jittered exponential backoff.
///
/// Adds random jitter (0.75-1.25x) to each delay so many workers
/// recovering from the same outage do not retry in lockstep.
pub async fn retry_with_jittered_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    warn!(error = %error, "Non-retryable error, giving up");
                    return Err(error);
                }

                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "Max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let base_backoff = policy.backoff(attempt);
                let jitter = 0.75 + (rand::random::<f64>() * 0.5);
                let jittered_backoff =
                    Duration::from_millis((base_backoff.as_millis() as f64 * jitter) as u64);

                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = jittered_backoff.as_millis(),
                    error = %error,
                    "Retryable error, backing off with jitter"
                );

                sleep(jittered_backoff).await;
                attempt += 1;
            }
        }
    }
}

/// [`StreamApi`] decorator that retries transient fetch failures.
///
/// Fetches go through [`retry_with_jittered_backoff`]; once retries are
/// exhausted the error surfaces to the caller, which applies its own
/// cycle-level backoff. Cursor creation passes through untouched: a
/// creation failure is fatal for the caller's current cycle and is
/// retried there, not here.
pub struct RetryingApi {
    inner: Arc<dyn StreamApi>,
    policy: RetryPolicy,
}

impl RetryingApi {
    pub fn new(inner: Arc<dyn StreamApi>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl StreamApi for RetryingApi {
    async fn create_group_cursor(&self, details: &GroupCursorDetails) -> Result<Cursor, ClientError> {
        self.inner.create_group_cursor(details).await
    }

    async fn get_messages(&self, cursor: &Cursor, limit: u32) -> Result<MessageBatch, ClientError> {
        retry_with_jittered_backoff(&self.policy, || self.inner.get_messages(cursor, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ========================================================================
    // RetryPolicy - defaults and backoff calculation
    // ========================================================================

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_backoff_exponential_growth() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_max_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(10), 2.0);
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10)); // Capped
        assert_eq!(policy.backoff(100), Duration::from_secs(10)); // Still capped
    }

    #[test]
    fn test_backoff_multiplier_one_is_constant() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500), Duration::from_secs(60), 1.0);
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
    }

    // ========================================================================
    // RetryPolicy - is_retryable
    // ========================================================================

    #[test]
    fn test_is_retryable_throttled() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&ClientError::Throttled));
    }

    #[test]
    fn test_is_retryable_transport() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&ClientError::Transport("connect timeout".to_string())));
    }

    #[test]
    fn test_is_retryable_5xx() {
        let policy = RetryPolicy::default();
        for status in [500u16, 502, 503, 504] {
            assert!(policy.is_retryable(&ClientError::Service {
                status,
                message: "server side".to_string()
            }));
        }
    }

    #[test]
    fn test_not_retryable_4xx() {
        let policy = RetryPolicy::default();
        for status in [400u16, 401, 403, 404, 409] {
            assert!(!policy.is_retryable(&ClientError::Service {
                status,
                message: "client side".to_string()
            }));
        }
    }

    #[test]
    fn test_not_retryable_cursor_creation() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_retryable(&ClientError::CursorCreation("bad group".to_string())));
    }

    #[test]
    fn test_not_retryable_invalid_response_and_config() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_retryable(&ClientError::InvalidResponse("no header".to_string())));
        assert!(!policy.is_retryable(&ClientError::Config("empty endpoint".to_string())));
    }

    // ========================================================================
    // retry_with_backoff
    // ========================================================================

    #[tokio::test]
    async fn test_retry_immediate_success() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<i32, ClientError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_eventual_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(ClientError::Throttled)
                } else {
                    Ok::<i32, ClientError>(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_fails_immediately() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, ClientError>(ClientError::Service {
                    status: 404,
                    message: "no such stream".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, ClientError>(ClientError::Throttled)
            }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt + 2 retries = 3 total
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_switches_to_non_retryable_stops() {
        let policy = RetryPolicy::new(10, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<(), ClientError> = retry_with_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count == 0 {
                    Err(ClientError::Transport("blip".to_string()))
                } else {
                    Err(ClientError::Config("permanent".to_string()))
                }
            }
        })
        .await;

        assert!(matches!(result, Err(ClientError::Config(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    // ========================================================================
    // retry_with_jittered_backoff
    // ========================================================================

    #[tokio::test]
    async fn test_jittered_retry_eventual_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_jittered_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 3 {
                    Err(ClientError::Service {
                        status: 503,
                        message: "busy".to_string(),
                    })
                } else {
                    Ok::<&str, ClientError>("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_jittered_retry_exhausted() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_jittered_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), ClientError>(ClientError::Throttled)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    // ========================================================================
    // RetryingApi decorator
    // ========================================================================

    /// Inner API that fails fetches a fixed number of times, then succeeds.
    struct FlakyApi {
        create_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        fetch_failures: usize,
    }

    impl FlakyApi {
        fn new(fetch_failures: usize) -> Self {
            Self {
                create_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
                fetch_failures,
            }
        }
    }

    #[async_trait]
    impl StreamApi for FlakyApi {
        async fn create_group_cursor(
            &self,
            _details: &GroupCursorDetails,
        ) -> Result<Cursor, ClientError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::CursorCreation("down".to_string()))
        }

        async fn get_messages(
            &self,
            cursor: &Cursor,
            _limit: u32,
        ) -> Result<MessageBatch, ClientError> {
            let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fetch_failures {
                Err(ClientError::Throttled)
            } else {
                Ok(MessageBatch {
                    messages: vec![],
                    next_cursor: Cursor(format!("after-{}", cursor.as_str())),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_retrying_api_retries_transient_fetch_failures() {
        let inner = Arc::new(FlakyApi::new(2));
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let api = RetryingApi::new(inner.clone(), policy);

        let batch = api
            .get_messages(&Cursor("c".to_string()), 100)
            .await
            .unwrap();
        assert_eq!(batch.next_cursor, Cursor("after-c".to_string()));
        assert_eq!(inner.fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_api_surfaces_exhausted_failures() {
        let inner = Arc::new(FlakyApi::new(100));
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        let api = RetryingApi::new(inner.clone(), policy);

        let result = api.get_messages(&Cursor("c".to_string()), 100).await;
        assert!(matches!(result, Err(ClientError::Throttled)));
        assert_eq!(inner.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retrying_api_does_not_retry_cursor_creation() {
        let inner = Arc::new(FlakyApi::new(0));
        let api = RetryingApi::new(inner.clone(), RetryPolicy::default());

        let result = api
            .create_group_cursor(&GroupCursorDetails::trim_horizon("g", "i"))
            .await;
        assert!(matches!(result, Err(ClientError::CursorCreation(_))));
        assert_eq!(inner.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_backoff_actually_waits() {
        let policy = RetryPolicy::new(1, Duration::from_millis(50), Duration::from_millis(200), 2.0);

        let start = tokio::time::Instant::now();
        let _ = retry_with_backoff(&policy, || async {
            Err::<(), ClientError>(ClientError::Throttled)
        })
        .await;

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(40),
            "Expected at least ~50ms delay, got {:?}",
            elapsed
        );
    }
}
