//! Reddit JSON API client.
//!
//! Reddit expects:
//! - a descriptive User-Agent naming the app and a contact point
//! - no more than one request every few seconds from anonymous clients
//!
//! Every call goes through one pacing gate per client instance, so concurrent
//! resolutions sharing a client cannot burst past the limit together.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::config::{PacingConfig, RedditConfig};

use super::oauth::{TokenCache, TokenResponse};
use super::rate_limiter::RateLimitState;
use super::{FetchError, ListingPage, ListingRequest, RawListing, RedditApi};

/// Reddit API client with adaptive pacing and optional OAuth.
pub struct RedditClient {
    client: Client,
    config: RedditConfig,
    pacing: PacingConfig,
    /// Short critical sections only; never held across an await.
    state: Mutex<RateLimitState>,
    /// Serializes the read-wait-sleep-mark sequence across callers.
    gate: tokio::sync::Mutex<()>,
    /// Held across the token exchange so concurrent callers share one exchange.
    tokens: tokio::sync::Mutex<TokenCache>,
}

impl RedditClient {
    /// Create a new client.
    ///
    /// The pacing floor is the authenticated one when OAuth credentials are
    /// configured, the unauthenticated one otherwise.
    pub fn new(config: RedditConfig, pacing: PacingConfig) -> Result<Self, FetchError> {
        let base_delay = if config.has_credentials() {
            Duration::from_millis(pacing.authenticated_delay_ms)
        } else {
            Duration::from_millis(pacing.unauthenticated_delay_ms)
        };
        let state = RateLimitState::new(base_delay, &pacing);
        Self::with_state(config, pacing, state)
    }

    /// Create a client starting from an existing pacing state.
    pub fn with_state(
        config: RedditConfig,
        pacing: PacingConfig,
        state: RateLimitState,
    ) -> Result<Self, FetchError> {
        for url in [&config.base_url, &config.oauth_base_url] {
            reqwest::Url::parse(url)
                .map_err(|e| FetchError::InvalidConfig(format!("bad URL {:?}: {}", url, e)))?;
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;

        let tokens = TokenCache::new(Duration::from_secs(pacing.token_refresh_margin_secs));

        Ok(Self {
            client,
            config,
            pacing,
            state: Mutex::new(state),
            gate: tokio::sync::Mutex::new(()),
            tokens: tokio::sync::Mutex::new(tokens),
        })
    }

    /// Copy of the current pacing state.
    pub fn rate_limit_state(&self) -> RateLimitState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        if !self.config.has_credentials() {
            return None;
        }
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    fn set_authenticated(&self, authenticated: bool) {
        let ms = if authenticated {
            self.pacing.authenticated_delay_ms
        } else {
            self.pacing.unauthenticated_delay_ms
        };
        self.lock_state().set_base_delay(Duration::from_millis(ms));
    }

    /// Current bearer token, exchanging credentials when needed.
    ///
    /// Any failure leaves the client on the public endpoints.
    async fn bearer_token(&self) -> Option<String> {
        let (client_id, client_secret) = self.credentials()?;

        let mut cache = self.tokens.lock().await;
        let now = Instant::now();
        if let Some(token) = cache.valid_token(now) {
            return Some(token.to_string());
        }
        if !cache.may_exchange(now) {
            return None;
        }

        match self.exchange_token(client_id, client_secret).await {
            Ok(response) => {
                debug!(expires_in = response.expires_in, "Obtained Reddit OAuth token");
                let token = response.access_token.clone();
                cache.store(
                    response.access_token,
                    Duration::from_secs(response.expires_in),
                    Instant::now(),
                );
                self.set_authenticated(true);
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "Reddit OAuth token exchange failed, using public endpoints");
                cache.record_failure(Instant::now());
                self.set_authenticated(false);
                None
            }
        }
    }

    async fn exchange_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, FetchError> {
        let url = format!(
            "{}/api/v1/access_token",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Parse(format!("Failed to parse token response: {}", e)))
    }

    /// Wait for the pacing delay, then claim the dispatch slot.
    ///
    /// Fails with `RateLimited` if a cooldown started while waiting.
    async fn pace(&self) -> Result<(), FetchError> {
        let _gate = self.gate.lock().await;

        let wait = self.lock_state().wait_before_next(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Reddit pacing: waiting");
            sleep(wait).await;
        }

        let mut state = self.lock_state();
        let now = Instant::now();
        if state.is_cooling_down(now) {
            return Err(FetchError::RateLimited);
        }
        state.mark_dispatched(now);
        Ok(())
    }
}

#[async_trait]
impl RedditApi for RedditClient {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn fetch_listing(&self, request: &ListingRequest) -> Result<ListingPage, FetchError> {
        if let Some(remaining) = self.lock_state().cooldown_remaining(Instant::now()) {
            debug!(
                request = %request,
                remaining_ms = remaining.as_millis() as u64,
                "Skipping Reddit request during rate-limit cooldown"
            );
            return Err(FetchError::RateLimited);
        }

        let token = self.bearer_token().await;
        self.pace().await?;

        let url = match &token {
            Some(_) => request.to_url(&self.config.oauth_base_url, false),
            None => request.to_url(&self.config.base_url, true),
        };
        debug!(url = %url, authenticated = token.is_some(), "Fetching Reddit listing");

        let mut builder = self.client.get(&url);
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Reddit request failed");
            FetchError::Network(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let mut state = self.lock_state();
            state.record_rate_limited(Instant::now());
            warn!(
                url = %url,
                delay_ms = state.current_delay().as_millis() as u64,
                "Reddit rate limit hit, cooling down"
            );
            return Err(FetchError::RateLimited);
        }

        // Only answers Reddit gave deliberately relax the backoff; 5xx and 401 keep it.
        if status == StatusCode::NOT_FOUND {
            self.lock_state().record_success();
            debug!(url = %url, "Reddit returned 404");
            return Err(FetchError::NotFound);
        }
        if status == StatusCode::UNAUTHORIZED && token.is_some() {
            self.tokens.lock().await.invalidate();
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        self.lock_state().record_success();

        let raw: RawListing = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let page = ListingPage::from(raw);
        debug!(
            url = %url,
            results = page.candidates.len(),
            has_more = page.after.is_some(),
            "Reddit listing fetched"
        );
        Ok(page)
    }

    fn is_rate_limited(&self) -> bool {
        self.lock_state().is_cooling_down(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_floor_without_credentials() {
        let client = RedditClient::new(RedditConfig::default(), PacingConfig::default()).unwrap();
        assert_eq!(
            client.rate_limit_state().base_delay(),
            Duration::from_millis(6000)
        );
        assert!(!client.is_rate_limited());
    }

    #[test]
    fn test_authenticated_floor_with_credentials() {
        let config = RedditConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        };
        let client = RedditClient::new(config, PacingConfig::default()).unwrap();
        assert_eq!(
            client.rate_limit_state().base_delay(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = RedditConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        let result = RedditClient::new(config, PacingConfig::default());
        assert!(matches!(result, Err(FetchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_cooldown_refuses_without_network() {
        let pacing = PacingConfig::default();
        let mut state = RateLimitState::new(Duration::from_millis(10), &pacing);
        state.record_rate_limited(Instant::now());

        // Port 9 (discard) would fail loudly if a request were actually sent.
        let config = RedditConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let client = RedditClient::with_state(config, pacing, state).unwrap();

        assert!(client.is_rate_limited());
        let request = ListingRequest::search("anything", 25);
        assert_eq!(
            client.fetch_listing(&request).await.unwrap_err(),
            FetchError::RateLimited
        );
        assert!(client.rate_limit_state().last_request().is_none());
    }
}
