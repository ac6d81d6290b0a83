//! Reddit access layer.
//!
//! This module provides the `RedditApi` trait used by search strategies and
//! `RedditClient`, its HTTP implementation with adaptive pacing, 429 cooldown
//! and optional client-credentials OAuth.

mod client;
mod oauth;
mod rate_limiter;
mod types;

pub use client::RedditClient;
pub use oauth::{TokenCache, TOKEN_RETRY_BACKOFF};
pub use rate_limiter::RateLimitState;
pub use types::*;
