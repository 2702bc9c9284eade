use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    /// Whether the request is allowed.
    pub allowed: bool,
    /// Bucket capacity (burst size).
    pub limit: u32,
    /// Whole tokens left after this check.
    pub remaining: u32,
    /// Seconds until the next token when denied, or until the bucket is full
    /// again when allowed.
    pub reset_after_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    const fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Add the tokens earned since the last refill, capped at `capacity`.
    fn refill(&mut self, now: Instant, capacity: f64, per_sec: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed.mul_add(per_sec, self.tokens).min(capacity);
        self.last_refill = self.last_refill.max(now);
    }

    fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-key token-bucket rate limiter.
///
/// Each key owns a bucket of `capacity` tokens that refills continuously at
/// `refill_per_sec`. Refill is computed lazily on every check; there is no
/// timer per bucket. Checks never block waiting for a token.
///
/// Buckets live in a sharded concurrent map, so checks on different keys
/// rarely contend and the first check for a key creates exactly one bucket
/// even when several requests race for it.
///
/// Memory is bounded coarsely: [`RateLimiter::sweep`] drops *every* bucket
/// once the map holds more than the sweep threshold. Clients lose their
/// accumulated history on a reset (they start again from a full bucket); that
/// imprecision is accepted in exchange for not tracking recency.
pub struct RateLimiter<K: Eq + Hash> {
    buckets: DashMap<K, TokenBucket>,
    capacity: u32,
    refill_per_sec: f64,
    sweep_threshold: usize,
}

impl<K: Eq + Hash> RateLimiter<K> {
    /// Reset the map once it holds more than this many keys.
    pub const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

    /// How often the background sweeper checks the map size.
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

    pub fn new(refill_per_sec: f64, capacity: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec: refill_per_sec.max(0.0),
            sweep_threshold: Self::DEFAULT_SWEEP_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    pub const fn refill_per_sec(&self) -> f64 {
        self.refill_per_sec
    }

    /// Consume one token for `key` if available. Never blocks.
    pub fn admit(&self, key: K) -> bool {
        self.check(key).allowed
    }

    /// Consume one token for `key` if available and report the bucket state.
    pub fn check(&self, key: K) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    /// Same as [`RateLimiter::check`] with an explicit clock reading.
    pub fn check_at(&self, key: K, now: Instant) -> RateLimitResult {
        let capacity = f64::from(self.capacity);
        // The entry guard holds this key's shard lock, so refill-and-take is
        // atomic per key.
        let (allowed, tokens) = {
            let mut bucket = self
                .buckets
                .entry(key)
                .or_insert_with(|| TokenBucket::full(capacity, now));
            bucket.refill(now, capacity, self.refill_per_sec);
            let allowed = bucket.try_take();
            (allowed, bucket.tokens)
        };

        let reset_after_secs = if allowed {
            secs_to_earn(capacity - tokens, self.refill_per_sec)
        } else {
            secs_to_earn(1.0 - tokens, self.refill_per_sec)
        };
        RateLimitResult {
            allowed,
            limit: self.capacity,
            remaining: whole_tokens(tokens),
            reset_after_secs,
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Clear every bucket if the map has grown past the sweep threshold.
    /// Returns whether a reset happened.
    pub fn sweep(&self) -> bool {
        let tracked = self.buckets.len();
        if tracked <= self.sweep_threshold {
            return false;
        }
        self.buckets.clear();
        tracing::info!(
            tracked,
            threshold = self.sweep_threshold,
            "rate limiter registry reset"
        );
        true
    }
}

impl<K> RateLimiter<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    /// Run [`RateLimiter::sweep`] every `every` on the current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the limiter is
    /// dropped; abort the handle to stop it earlier.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep();
            }
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_tokens(tokens: f64) -> u32 {
    tokens.max(0.0).floor() as u32
}

/// Whole seconds needed to earn `needed` tokens; saturates when the bucket
/// never refills.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn secs_to_earn(needed: f64, per_sec: f64) -> u64 {
    if needed <= 0.0 {
        return 0;
    }
    if per_sec <= 0.0 {
        return u64::MAX;
    }
    (needed / per_sec).ceil() as u64
}

/// Rate limiter keyed by client IP address string.
pub type IpRateLimiter = RateLimiter<String>;
