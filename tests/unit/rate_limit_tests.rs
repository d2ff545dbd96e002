/*!
 * Tests for rate limiting and retry timing, run on a paused clock
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dataset_translator::app_config::BackendId;
use dataset_translator::errors::BackendError;
use dataset_translator::providers::MockBackend;
use dataset_translator::translation::{translate_with_retry, RateLimiter, RetryPolicy};

/// Permits granted to concurrent callers arriving at random times never exceed the RPM in any minute
#[tokio::test(start_paused = true)]
async fn test_rateLimiter_withRandomArrivals_shouldRespectWindow() {
    let rpm = 7;
    let limiter = Arc::new(RateLimiter::new([(BackendId::Nvidia, Some(rpm))]).unwrap());
    let mut rng = StdRng::seed_from_u64(42);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let limiter = limiter.clone();
        let delay = Duration::from_millis(rng.random_range(0..120_000));
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            limiter.acquire(BackendId::Nvidia).await.granted_at
        }));
    }

    let mut grants = Vec::new();
    for handle in handles {
        grants.push(handle.await.unwrap());
    }
    grants.sort();

    let rpm = rpm as usize;
    for window in grants.windows(rpm + 1) {
        let span = window[rpm].duration_since(window[0]);
        assert!(span >= Duration::from_secs(60), "{} permits within {:?}", rpm + 1, span);
    }
}

#[tokio::test(start_paused = true)]
async fn test_rateLimiter_shouldServeWaitersInArrivalOrder() {
    let limiter = Arc::new(RateLimiter::new([(BackendId::Fanar, Some(60))]).unwrap());
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let limiter = limiter.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            // Stagger arrivals slightly so arrival order is well defined
            tokio::time::sleep(Duration::from_millis(i * 10)).await;
            limiter.acquire(BackendId::Fanar).await;
            order.lock().push(i);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
}

/// Two failures with multiplier 2 sleep 1s then 2s before the successful third attempt
#[tokio::test(start_paused = true)]
async fn test_retry_withTransientFailures_shouldBackOffExponentially() {
    let backend = MockBackend::fail_first(
        BackendId::Nvidia,
        2,
        BackendError::Unknown {
            message: "HTTP 503".to_string(),
            transient: true,
        },
    );
    let policy = RetryPolicy {
        max_retries: 3,
        backoff_multiplier: 2.0,
        request_timeout: Duration::from_secs(30),
    };

    let start = Instant::now();
    let attempted = translate_with_retry(&backend, "hello", &RateLimiter::unlimited(), &policy).await;

    assert!(attempted.outcome.is_ok());
    assert_eq!(attempted.attempts, 3);
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert!(start.elapsed() < Duration::from_secs(4));
}

/// A retry waits for both the backoff and the next rate limit slot
#[tokio::test(start_paused = true)]
async fn test_retry_withRateLimit_shouldWaitForLongerOfBackoffAndSpacing() {
    let backend = MockBackend::fail_first(BackendId::Nvidia, 1, BackendError::RateLimited("429".to_string()));
    let limiter = RateLimiter::new([(BackendId::Nvidia, Some(6))]).unwrap();
    let policy = RetryPolicy {
        max_retries: 1,
        backoff_multiplier: 2.0,
        request_timeout: Duration::from_secs(30),
    };

    let start = Instant::now();
    let attempted = translate_with_retry(&backend, "hello", &limiter, &policy).await;

    assert!(attempted.outcome.is_ok());
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(11));
}
