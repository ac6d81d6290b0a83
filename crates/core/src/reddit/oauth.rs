//! Cached application-only OAuth token.

use serde::Deserialize;
use tokio::time::{Duration, Instant};

/// After a failed exchange, wait this long before trying again.
pub const TOKEN_RETRY_BACKOFF: Duration = Duration::from_secs(300);

/// Response of `POST /api/v1/access_token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Bearer token cache for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct TokenCache {
    token: Option<CachedToken>,
    refresh_margin: Duration,
    retry_after: Option<Instant>,
}

impl TokenCache {
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            token: None,
            refresh_margin,
            retry_after: None,
        }
    }

    /// The cached token, unless it is within the refresh margin of expiring.
    pub fn valid_token(&self, now: Instant) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|t| now + self.refresh_margin < t.expires_at)
            .map(|t| t.access_token.as_str())
    }

    pub fn store(&mut self, access_token: String, expires_in: Duration, now: Instant) {
        self.token = Some(CachedToken {
            access_token,
            expires_at: now + expires_in,
        });
        self.retry_after = None;
    }

    /// Drop the token and hold off new exchanges for [`TOKEN_RETRY_BACKOFF`].
    pub fn record_failure(&mut self, now: Instant) {
        self.token = None;
        self.retry_after = Some(now + TOKEN_RETRY_BACKOFF);
    }

    /// Drop a token Reddit rejected; a new exchange may happen right away.
    pub fn invalidate(&mut self) {
        self.token = None;
    }

    pub fn may_exchange(&self, now: Instant) -> bool {
        self.retry_after.is_none_or(|after| now >= after)
    }
}
