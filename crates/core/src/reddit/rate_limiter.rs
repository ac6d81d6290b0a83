//! Adaptive request pacing for the Reddit API.
//!
//! Reddit publishes a per-client quota but enforces it loosely and answers
//! bursts with 429s. Instead of a token bucket we keep a single minimum gap
//! between requests that widens on 429 and decays back on success.

use tokio::time::{Duration, Instant};

use crate::config::PacingConfig;

/// Mutable pacing state for one client instance.
///
/// Pure value: every method takes the current instant, so behavior can be
/// driven deterministically from tests. Never persisted.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// When the previous request was dispatched.
    last_request: Option<Instant>,
    /// Current minimum gap between requests.
    current_delay: Duration,
    /// Floor the delay decays back to.
    base_delay: Duration,
    max_delay: Duration,
    decay_factor: f64,
    cooldown: Duration,
    /// Calls before this instant are refused without touching the network.
    rate_limited_until: Option<Instant>,
}

impl RateLimitState {
    /// Create a fresh state with the given floor.
    pub fn new(base_delay: Duration, config: &PacingConfig) -> Self {
        Self {
            last_request: None,
            current_delay: base_delay,
            base_delay,
            max_delay: Duration::from_millis(config.max_delay_ms),
            decay_factor: config.decay_factor,
            cooldown: Duration::from_millis(config.cooldown_ms),
            rate_limited_until: None,
        }
    }

    /// How long to sleep before the next request may be dispatched.
    pub fn wait_before_next(&self, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => self
                .current_delay
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Record that a request is being dispatched now.
    pub fn mark_dispatched(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    /// Reddit answered without a 429: decay the delay toward the floor.
    pub fn record_success(&mut self) {
        let decayed_ms = (self.current_delay.as_millis() as f64 * self.decay_factor).round();
        self.current_delay = Duration::from_millis(decayed_ms as u64).max(self.base_delay);
    }

    /// Reddit answered 429: double the delay (capped) and start a cooldown.
    pub fn record_rate_limited(&mut self, now: Instant) {
        self.current_delay = (self.current_delay * 2).min(self.max_delay);
        self.rate_limited_until = Some(now + self.cooldown);
    }

    /// Whether calls are currently refused.
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.rate_limited_until.is_some_and(|until| now < until)
    }

    /// Time left in the cooldown, if one is active.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.rate_limited_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Switch the pacing floor, e.g. when an OAuth token is gained or lost.
    ///
    /// Raising the floor takes effect immediately; lowering it lets the
    /// current delay decay down over subsequent successes.
    pub fn set_base_delay(&mut self, base_delay: Duration) {
        self.base_delay = base_delay;
        self.current_delay = self.current_delay.max(base_delay);
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    pub fn rate_limited_until(&self) -> Option<Instant> {
        self.rate_limited_until
    }
}
