use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct Limits {
    /// Sustained refill rate; 0 disables limiting.
    pub requests_per_min: u64,
    /// Bucket capacity, i.e. how many actions may run back to back.
    pub burst: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            requests_per_min: 60,
            burst: 10,
        }
    }
}

/// Token bucket per key (one key per user). Never waits: callers either get a
/// token or are told to back off.
#[derive(Clone, Debug)]
pub struct KeyedRateLimiter {
    inner: Arc<Inner>,
}

/// Bucket count above which full buckets are dropped.
const PRUNE_ABOVE: usize = 1024;

#[derive(Debug)]
struct Inner {
    limits: Limits,
    prune_above: usize,
    // token buckets are modeled by the current tokens and the time of last refill
    buckets: Mutex<HashMap<String, (f64, Instant)>>,
}

impl KeyedRateLimiter {
    pub fn new(limits: Limits) -> Self {
        Self::with_prune_threshold(limits, PRUNE_ABOVE)
    }

    fn with_prune_threshold(limits: Limits, prune_above: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                limits,
                prune_above,
                buckets: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Take one token from `key`'s bucket if available.
    pub async fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now()).await
    }

    pub(crate) async fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let limits = &self.inner.limits;
        if limits.requests_per_min == 0 {
            return true;
        }

        let capacity = f64::from(limits.burst.max(1));
        let refill_rate = limits.requests_per_min as f64 / 60.0; // tokens per second

        let mut buckets = self.inner.buckets.lock().await;
        // A bucket that has refilled to capacity is the same as no bucket.
        if buckets.len() >= self.inner.prune_above {
            buckets.retain(|_, (tokens, last)| {
                let elapsed = now.saturating_duration_since(*last).as_secs_f64();
                *tokens + elapsed * refill_rate < capacity
            });
        }

        let (tokens, last) = buckets
            .entry(key.to_string())
            .or_insert((capacity, now));

        let elapsed = now.saturating_duration_since(*last).as_secs_f64();
        *tokens = (*tokens + elapsed * refill_rate).min(capacity);
        *last = now;

        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
