use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Reddit API access configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedditConfig {
    /// OAuth client id (script/app type). Enables the authenticated quota tier
    /// together with `client_secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// User-Agent sent with every request.
    /// Reddit expects "<platform>:<app id>:<version> (by /u/<contact>)".
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Public JSON API host (default: https://www.reddit.com).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Host used once a bearer token is held (default: https://oauth.reddit.com).
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl RedditConfig {
    /// Both halves of the client-credentials pair are present and non-empty.
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.client_id, &self.client_secret),
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty()
        )
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: default_user_agent(),
            base_url: default_base_url(),
            oauth_base_url: default_oauth_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "rust:sourcefinder:v{} (screenshot source lookup; contact https://github.com/sourcefinder)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_base_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_oauth_base_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Outbound request pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PacingConfig {
    /// Minimum gap between requests while holding an OAuth token.
    #[serde(default = "default_authenticated_delay")]
    pub authenticated_delay_ms: u64,
    /// Minimum gap between requests on the public endpoints.
    #[serde(default = "default_unauthenticated_delay")]
    pub unauthenticated_delay_ms: u64,
    /// Upper bound for the adaptive delay after repeated 429s.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each successful request.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// How long every call is refused after a 429.
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    /// Tokens are treated as expired this many seconds early.
    #[serde(default = "default_token_refresh_margin")]
    pub token_refresh_margin_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            authenticated_delay_ms: default_authenticated_delay(),
            unauthenticated_delay_ms: default_unauthenticated_delay(),
            max_delay_ms: default_max_delay(),
            decay_factor: default_decay_factor(),
            cooldown_ms: default_cooldown(),
            token_refresh_margin_secs: default_token_refresh_margin(),
        }
    }
}

fn default_authenticated_delay() -> u64 {
    1000
}

fn default_unauthenticated_delay() -> u64 {
    6000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_decay_factor() -> f64 {
    0.8
}

fn default_cooldown() -> u64 {
    60_000
}

fn default_token_refresh_margin() -> u64 {
    60
}

/// Strategy runner tuning
///
/// The two thresholds are empirically chosen calibration points.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// A strategy result at or above this confidence ends the run immediately.
    #[serde(default = "default_short_circuit")]
    pub short_circuit_threshold: f64,
    /// The best retained result must reach this confidence to be reported.
    #[serde(default = "default_min_match")]
    pub min_match_threshold: f64,
    /// `limit` parameter for search requests.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    /// Pages of comment history walked by the user-history strategy.
    #[serde(default = "default_max_comment_pages")]
    pub max_comment_pages: u32,
    /// Items per comment history page.
    #[serde(default = "default_comment_page_size")]
    pub comment_page_size: u32,
    /// Overall budget for one resolution; checked between strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            short_circuit_threshold: default_short_circuit(),
            min_match_threshold: default_min_match(),
            search_limit: default_search_limit(),
            max_comment_pages: default_max_comment_pages(),
            comment_page_size: default_comment_page_size(),
            timeout_secs: None,
        }
    }
}

fn default_short_circuit() -> f64 {
    0.8
}

fn default_min_match() -> f64 {
    0.4
}

fn default_search_limit() -> u32 {
    25
}

fn default_max_comment_pages() -> u32 {
    10
}

fn default_comment_page_size() -> u32 {
    100
}

/// Sanitized config for logging and diagnostics (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub reddit: SanitizedRedditConfig,
    pub pacing: PacingConfig,
    pub resolver: ResolverConfig,
}

/// Sanitized Reddit config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRedditConfig {
    pub oauth_configured: bool,
    pub user_agent: String,
    pub base_url: String,
    pub oauth_base_url: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            reddit: SanitizedRedditConfig {
                oauth_configured: config.reddit.has_credentials(),
                user_agent: config.reddit.user_agent.clone(),
                base_url: config.reddit.base_url.clone(),
                oauth_base_url: config.reddit.oauth_base_url.clone(),
                timeout_secs: config.reddit.timeout_secs,
            },
            pacing: config.pacing.clone(),
            resolver: config.resolver.clone(),
        }
    }
}
