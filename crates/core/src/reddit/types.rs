//! Types for the Reddit access layer.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::matching::sanitize_identifier;

/// Host used to turn permalinks into user-facing URLs.
pub const REDDIT_WEB_ORIGIN: &str = "https://www.reddit.com";

/// Whether a candidate is a submission or a comment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Post,
    Comment,
}

/// A Reddit post or comment fetched while searching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: CandidateKind,
    /// Site-relative permalink, e.g. `/r/cats/comments/abc123/title/`.
    pub permalink: String,
    /// Post title, or the parent post's title for a comment.
    pub title: String,
    pub author: String,
    pub subreddit: String,
    /// Post selftext or comment body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn is_comment(&self) -> bool {
        self.kind == CandidateKind::Comment
    }

    /// Absolute URL for the permalink.
    pub fn url(&self) -> String {
        if self.permalink.starts_with("http://") || self.permalink.starts_with("https://") {
            self.permalink.clone()
        } else {
            format!(
                "{}/{}",
                REDDIT_WEB_ORIGIN,
                self.permalink.trim_start_matches('/')
            )
        }
    }
}

/// One page of a Reddit listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub candidates: Vec<Candidate>,
    /// Cursor for the next page; `None` at the end of the listing.
    pub after: Option<String>,
}

/// A listing request relative to the API host.
///
/// Paths are stored without the `.json` suffix; the client appends it for the
/// public host and leaves it off for the OAuth host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ListingRequest {
    /// Site-wide search, `/search?q=..&sort=relevance&limit=..`.
    pub fn search(query: &str, limit: u32) -> Self {
        Self {
            path: "/search".to_string(),
            params: vec![
                ("q".to_string(), query.to_string()),
                ("sort".to_string(), "relevance".to_string()),
                ("limit".to_string(), limit.to_string()),
            ],
        }
    }

    /// Search restricted to one subreddit. `None` when the name sanitizes to nothing.
    pub fn subreddit_search(subreddit: &str, query: &str, limit: u32) -> Option<Self> {
        let subreddit = sanitize_identifier(subreddit)?;
        let mut request = Self::search(query, limit);
        request.path = format!("/r/{}/search", subreddit);
        request
            .params
            .push(("restrict_sr".to_string(), "on".to_string()));
        Some(request)
    }

    /// A user's comment history, newest first. `None` when the name sanitizes to nothing.
    pub fn user_comments(username: &str, limit: u32, after: Option<&str>) -> Option<Self> {
        let username = sanitize_identifier(username)?;
        let mut params = vec![
            ("sort".to_string(), "new".to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(cursor) = after {
            params.push(("after".to_string(), cursor.to_string()));
        }
        Some(Self {
            path: format!("/user/{}/comments", username),
            params,
        })
    }

    /// Value of a query parameter, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Full URL on the given host.
    pub fn to_url(&self, base_url: &str, json_suffix: bool) -> String {
        let mut url = format!(
            "{}{}{}",
            base_url.trim_end_matches('/'),
            self.path,
            if json_suffix { ".json" } else { "" }
        );
        let mut separator = '?';
        for (key, value) in &self.params {
            url.push(separator);
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            separator = '&';
        }
        url
    }
}

impl fmt::Display for ListingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url("", false))
    }
}

/// Why a single request produced no listing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP 404: the subreddit or user does not exist.
    #[error("Not found")]
    NotFound,

    /// HTTP 429, or a call attempted during the cooldown that follows one.
    #[error("Rate limited by Reddit")]
    RateLimited,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The client could not be built from its configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

/// The seam between search strategies and Reddit.
///
/// Implemented by [`super::RedditClient`] and by the mock in `testing`.
#[async_trait]
pub trait RedditApi: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch one listing page.
    async fn fetch_listing(&self, request: &ListingRequest) -> Result<ListingPage, FetchError>;

    /// True while a rate-limit cooldown is active; calls made now would be refused.
    fn is_rate_limited(&self) -> bool;
}

// Reddit listing wire format

#[derive(Debug, Deserialize)]
pub(crate) struct RawListing {
    pub data: RawListingData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawListingData {
    #[serde(default)]
    pub children: Vec<RawThing>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawThing {
    pub kind: String,
    pub data: RawThingData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawThingData {
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link_title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
}

impl RawThing {
    /// Convert a `t3` (link) or `t1` (comment) thing; anything else is skipped.
    pub(crate) fn into_candidate(self) -> Option<Candidate> {
        let kind = match self.kind.as_str() {
            "t3" => CandidateKind::Post,
            "t1" => CandidateKind::Comment,
            _ => return None,
        };
        let data = self.data;
        let permalink = data.permalink?;
        let (title, body_text) = match kind {
            CandidateKind::Post => (data.title.unwrap_or_default(), data.selftext),
            CandidateKind::Comment => (data.link_title.unwrap_or_default(), data.body),
        };

        Some(Candidate {
            kind,
            permalink,
            title,
            author: data.author.unwrap_or_default(),
            subreddit: data.subreddit.unwrap_or_default(),
            body_text: body_text.filter(|b| !b.is_empty()),
            created_at: data
                .created_utc
                .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single()),
        })
    }
}

impl From<RawListing> for ListingPage {
    fn from(raw: RawListing) -> Self {
        Self {
            candidates: raw
                .data
                .children
                .into_iter()
                .filter_map(RawThing::into_candidate)
                .collect(),
            after: raw.data.after.filter(|a| !a.is_empty()),
        }
    }
}
