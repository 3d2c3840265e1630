use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// One request per `interval`, one in flight at a time. This is what the
    /// public JSON listings informally expect from unauthenticated clients.
    pub fn polite(interval: Duration) -> Self {
        Self {
            max_requests: 1,
            time_window: interval,
            burst_allowance: 1,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::polite(Duration::from_secs(2))
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance.max(1) as f64;
        let window = config.time_window.as_secs_f64();
        let refill_rate = if window > 0.0 {
            config.max_requests.max(1) as f64 / window
        } else {
            f64::INFINITY
        };

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Take `tokens_needed` tokens, or report how long until they are available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.burst_allowance.max(1) as usize));
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            semaphore,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        // The semaphore is owned by this limiter and never closed.
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        RateLimitPermit {
            _permit: permit,
            queue_wait_time: start_time.elapsed(),
        }
    }

    #[cfg(test)]
    fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Held for the duration of one request; dropping it frees the in-flight slot.
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
    pub queue_wait_time: Duration,
}

/// Hands out one [`RateLimiter`] per origin host so concurrent fetches against
/// the same host share a politeness budget.
#[derive(Debug)]
pub struct HostRateLimiter {
    config: RateLimitConfig,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl HostRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    pub async fn limiter_for(&self, host: &str) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(host.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(RateLimiter::new(self.config.clone())))
            .clone()
    }

    pub async fn acquire_permit(&self, host: &str) -> RateLimitPermit {
        self.limiter_for(host).await.acquire_permit().await
    }

    #[cfg(test)]
    async fn host_count(&self) -> usize {
        self.limiters.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_bucket_basic() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };

        let bucket = TokenBucket::new(&config);

        for _ in 0..5 {
            assert!(bucket.acquire(1.0).await.is_ok());
        }

        // Next acquisition should fail with a wait hint of about one second
        let wait = bucket.acquire(1.0).await.unwrap_err();
        assert!(wait <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_refill() {
        let config = RateLimitConfig::polite(Duration::from_secs(2));
        let bucket = TokenBucket::new(&config);

        assert!(bucket.acquire(1.0).await.is_ok());
        assert!(bucket.acquire(1.0).await.is_err());

        tokio::time::advance(Duration::from_millis(2001)).await;
        assert!(bucket.acquire(1.0).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polite_limiter_spaces_requests() {
        let limiter = RateLimiter::new(RateLimitConfig::polite(Duration::from_secs(2)));
        let start = Instant::now();

        let first = limiter.acquire_permit().await;
        assert_eq!(first.queue_wait_time, Duration::ZERO);
        drop(first);

        let _second = limiter.acquire_permit().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_limiters_are_independent() {
        let hosts = HostRateLimiter::new(RateLimitConfig::polite(Duration::from_secs(2)));
        let start = Instant::now();

        drop(hosts.acquire_permit("www.reddit.com").await);
        drop(hosts.acquire_permit("old.reddit.com").await);
        assert!(start.elapsed() < Duration::from_secs(1));

        drop(hosts.acquire_permit("WWW.REDDIT.COM").await);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(hosts.host_count().await, 2);
    }
}
