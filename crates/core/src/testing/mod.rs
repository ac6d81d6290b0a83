//! Testing utilities and a mock Reddit API.
//!
//! Lets resolution be exercised end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sourcefinder_core::testing::{fixtures, MockRedditApi};
//! use sourcefinder_core::{Resolver, ResolverConfig};
//!
//! let api = Arc::new(MockRedditApi::new());
//! api.set_page("/search", fixtures::page(vec![/* candidates */])).await;
//!
//! let resolver = Resolver::new(api.clone(), ResolverConfig::default());
//! let result = resolver.resolve(&fixtures::query(Some("cats"), None, Some("A title"))).await;
//! ```

mod mock_reddit;

pub use mock_reddit::{MockRedditApi, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::reddit::{Candidate, CandidateKind, ListingPage};
    use crate::resolver::{ExtractionConfidence, ExtractionQuery};

    /// Create a post candidate.
    pub fn post(permalink: &str, title: &str, author: &str, subreddit: &str) -> Candidate {
        Candidate {
            kind: CandidateKind::Post,
            permalink: permalink.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            subreddit: subreddit.to_string(),
            body_text: None,
            created_at: None,
        }
    }

    /// Create a post candidate with selftext.
    pub fn self_post(
        permalink: &str,
        title: &str,
        author: &str,
        subreddit: &str,
        selftext: &str,
    ) -> Candidate {
        let mut candidate = post(permalink, title, author, subreddit);
        candidate.body_text = Some(selftext.to_string());
        candidate
    }

    /// Create a comment candidate. `link_title` is the parent post's title.
    pub fn comment(
        permalink: &str,
        link_title: &str,
        author: &str,
        subreddit: &str,
        body: &str,
    ) -> Candidate {
        Candidate {
            kind: CandidateKind::Comment,
            permalink: permalink.to_string(),
            title: link_title.to_string(),
            author: author.to_string(),
            subreddit: subreddit.to_string(),
            body_text: Some(body.to_string()),
            created_at: None,
        }
    }

    /// A final listing page.
    pub fn page(candidates: Vec<Candidate>) -> ListingPage {
        ListingPage {
            candidates,
            after: None,
        }
    }

    /// A listing page followed by another.
    pub fn page_with_cursor(candidates: Vec<Candidate>, after: &str) -> ListingPage {
        ListingPage {
            candidates,
            after: Some(after.to_string()),
        }
    }

    /// Create a query with high extraction confidence and no body snippet.
    pub fn query(
        subreddit: Option<&str>,
        username: Option<&str>,
        title: Option<&str>,
    ) -> ExtractionQuery {
        ExtractionQuery {
            subreddit: subreddit.map(str::to_string),
            username: username.map(str::to_string),
            title: title.map(str::to_string),
            body_snippet: None,
            confidence: ExtractionConfidence::High,
        }
    }

    /// Create a query for a comment screenshot.
    pub fn comment_query(username: &str, body_snippet: &str) -> ExtractionQuery {
        ExtractionQuery {
            subreddit: None,
            username: Some(username.to_string()),
            title: None,
            body_snippet: Some(body_snippet.to_string()),
            confidence: ExtractionConfidence::Medium,
        }
    }

    /// Create a query for a reply screenshot that also shows the parent post's title.
    pub fn reply_query(username: &str, parent_title: &str, body_snippet: &str) -> ExtractionQuery {
        ExtractionQuery {
            title: Some(parent_title.to_string()),
            ..comment_query(username, body_snippet)
        }
    }
}
