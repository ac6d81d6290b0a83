//! Search strategies.
//!
//! Each strategy is one way of asking Reddit for candidates, paired with the
//! query fields it needs. The runner skips a strategy whose fields are missing
//! without counting it as a failure.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::matching::{extract_keywords, sanitize_identifier, MatchScorer, ScoredCandidate};
use crate::reddit::{FetchError, ListingPage, ListingRequest, RedditApi};

use super::types::{ExtractionQuery, QueryField};

/// What one strategy attempt produced.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    /// The best candidate the strategy found, whatever its score.
    Scored(ScoredCandidate),
    /// Nothing to score: empty results, a 404, or no usable query could be built.
    NoCandidates,
    /// Network, HTTP or parse failure; the run continues.
    SoftFailure(String),
    /// Reddit throttled the strategy before it found anything.
    RateLimited,
    /// The account named in the query does not exist.
    UserNotFound,
}

/// Shared dependencies handed to every strategy of one run.
pub struct StrategyContext<'a> {
    api: &'a dyn RedditApi,
    scorer: &'a MatchScorer,
    config: &'a ResolverConfig,
    requests: AtomicU32,
}

impl<'a> StrategyContext<'a> {
    pub fn new(api: &'a dyn RedditApi, scorer: &'a MatchScorer, config: &'a ResolverConfig) -> Self {
        Self {
            api,
            scorer,
            config,
            requests: AtomicU32::new(0),
        }
    }

    /// Fetch a listing, counting the call.
    pub async fn fetch(&self, request: &ListingRequest) -> Result<ListingPage, FetchError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.api.fetch_listing(request).await
    }

    /// Calls made through this context so far.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn scorer(&self) -> &MatchScorer {
        self.scorer
    }

    pub fn config(&self) -> &ResolverConfig {
        self.config
    }
}

/// One named way of querying Reddit.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Strategy name for logging and reports.
    fn name(&self) -> &'static str;

    /// Fields that must be usable for the strategy to run.
    fn required_fields(&self) -> &'static [QueryField];

    fn is_applicable(&self, query: &ExtractionQuery) -> bool {
        self.required_fields().iter().all(|field| query.has(*field))
    }

    /// Run the strategy. Only called when `is_applicable` holds.
    async fn run(&self, ctx: &StrategyContext<'_>, query: &ExtractionQuery) -> StrategyOutcome;
}

/// The standard strategy order.
pub fn default_strategies() -> Vec<Box<dyn SearchStrategy>> {
    vec![
        Box::new(TitleInSubreddit),
        Box::new(AuthorInSubreddit),
        Box::new(ExactTitle),
        Box::new(TitleWithAuthor),
        Box::new(UserCommentHistory),
    ]
}

fn outcome_for_error(strategy: &str, error: FetchError) -> StrategyOutcome {
    match error {
        FetchError::NotFound => {
            debug!(strategy, "Nothing at this location (404)");
            StrategyOutcome::NoCandidates
        }
        FetchError::RateLimited => StrategyOutcome::RateLimited,
        other => {
            warn!(strategy, error = %other, "Strategy request failed");
            StrategyOutcome::SoftFailure(other.to_string())
        }
    }
}

/// Run one search request and keep its best candidate.
async fn search_and_score(
    strategy: &str,
    ctx: &StrategyContext<'_>,
    query: &ExtractionQuery,
    request: Option<ListingRequest>,
) -> StrategyOutcome {
    let Some(request) = request else {
        debug!(strategy, "No usable search query for this strategy");
        return StrategyOutcome::NoCandidates;
    };

    match ctx.fetch(&request).await {
        Ok(page) => {
            debug!(strategy, results = page.candidates.len(), "Scoring search results");
            match ctx.scorer().best_match(&page.candidates, query) {
                Some(best) => StrategyOutcome::Scored(best),
                None => StrategyOutcome::NoCandidates,
            }
        }
        Err(e) => outcome_for_error(strategy, e),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Title keywords searched within the named subreddit.
pub struct TitleInSubreddit;

#[async_trait]
impl SearchStrategy for TitleInSubreddit {
    fn name(&self) -> &'static str {
        "title_in_subreddit"
    }

    fn required_fields(&self) -> &'static [QueryField] {
        &[QueryField::Subreddit, QueryField::Title]
    }

    async fn run(&self, ctx: &StrategyContext<'_>, query: &ExtractionQuery) -> StrategyOutcome {
        let request = match (query.subreddit(), query.title()) {
            (Some(subreddit), Some(title)) => non_empty(extract_keywords(title)).and_then(|q| {
                ListingRequest::subreddit_search(subreddit, &q, ctx.config().search_limit)
            }),
            _ => None,
        };
        search_and_score(self.name(), ctx, query, request).await
    }
}

/// Posts by the named author within the named subreddit.
pub struct AuthorInSubreddit;

#[async_trait]
impl SearchStrategy for AuthorInSubreddit {
    fn name(&self) -> &'static str {
        "author_in_subreddit"
    }

    fn required_fields(&self) -> &'static [QueryField] {
        &[QueryField::Subreddit, QueryField::Username]
    }

    async fn run(&self, ctx: &StrategyContext<'_>, query: &ExtractionQuery) -> StrategyOutcome {
        let request = match (query.subreddit(), query.username().and_then(sanitize_identifier)) {
            (Some(subreddit), Some(username)) => ListingRequest::subreddit_search(
                subreddit,
                &format!("author:{}", username),
                ctx.config().search_limit,
            ),
            _ => None,
        };
        search_and_score(self.name(), ctx, query, request).await
    }
}

/// Site-wide phrase search for the exact title.
pub struct ExactTitle;

#[async_trait]
impl SearchStrategy for ExactTitle {
    fn name(&self) -> &'static str {
        "exact_title"
    }

    fn required_fields(&self) -> &'static [QueryField] {
        &[QueryField::Title]
    }

    async fn run(&self, ctx: &StrategyContext<'_>, query: &ExtractionQuery) -> StrategyOutcome {
        let request = query
            .title()
            .map(|title| title.replace('"', ""))
            .map(|title| title.trim().to_string())
            .and_then(non_empty)
            .map(|title| ListingRequest::search(&format!("\"{}\"", title), ctx.config().search_limit));
        search_and_score(self.name(), ctx, query, request).await
    }
}

/// Site-wide search for title keywords by the named author.
pub struct TitleWithAuthor;

#[async_trait]
impl SearchStrategy for TitleWithAuthor {
    fn name(&self) -> &'static str {
        "title_with_author"
    }

    fn required_fields(&self) -> &'static [QueryField] {
        &[QueryField::Title, QueryField::Username]
    }

    async fn run(&self, ctx: &StrategyContext<'_>, query: &ExtractionQuery) -> StrategyOutcome {
        let keywords = query.title().map(extract_keywords).and_then(non_empty);
        let username = query.username().and_then(sanitize_identifier);
        let request = match (keywords, username) {
            (Some(keywords), Some(username)) => Some(ListingRequest::search(
                &format!("{} author:{}", keywords, username),
                ctx.config().search_limit,
            )),
            _ => None,
        };
        search_and_score(self.name(), ctx, query, request).await
    }
}

/// Walk the named user's recent comments and score each against the query.
///
/// A 404 on the first page means the account does not exist, which is
/// decisive for the whole resolution.
pub struct UserCommentHistory;

#[async_trait]
impl SearchStrategy for UserCommentHistory {
    fn name(&self) -> &'static str {
        "user_comment_history"
    }

    fn required_fields(&self) -> &'static [QueryField] {
        &[QueryField::Username]
    }

    async fn run(&self, ctx: &StrategyContext<'_>, query: &ExtractionQuery) -> StrategyOutcome {
        let Some(username) = query.username() else {
            return StrategyOutcome::NoCandidates;
        };
        let config = ctx.config();

        let mut best: Option<ScoredCandidate> = None;
        let mut after: Option<String> = None;

        for page_index in 0..config.max_comment_pages {
            let Some(request) =
                ListingRequest::user_comments(username, config.comment_page_size, after.as_deref())
            else {
                return StrategyOutcome::NoCandidates;
            };

            let page = match ctx.fetch(&request).await {
                Ok(page) => page,
                Err(FetchError::NotFound) if page_index == 0 => {
                    debug!(username, "User comment history not found");
                    return StrategyOutcome::UserNotFound;
                }
                Err(FetchError::RateLimited) => {
                    debug!(page = page_index, "Comment history paging stopped by rate limit");
                    return match best {
                        Some(best) => StrategyOutcome::Scored(best),
                        None => StrategyOutcome::RateLimited,
                    };
                }
                Err(FetchError::NotFound) => {
                    debug!(page = page_index, "Comment history ended early");
                    break;
                }
                Err(e) => {
                    if best.is_none() && page_index == 0 {
                        return outcome_for_error(self.name(), e);
                    }
                    warn!(page = page_index, error = %e, "Comment history paging stopped");
                    break;
                }
            };

            if let Some(page_best) = ctx.scorer().best_match(&page.candidates, query) {
                if best.as_ref().is_none_or(|b| page_best.score > b.score) {
                    best = Some(page_best);
                }
            }

            if best
                .as_ref()
                .is_some_and(|b| b.score >= config.short_circuit_threshold)
            {
                debug!(page = page_index, "Confident comment match, stopping pagination");
                break;
            }

            match page.after {
                Some(cursor) if !page.candidates.is_empty() => after = Some(cursor),
                _ => break,
            }
        }

        match best {
            Some(best) => StrategyOutcome::Scored(best),
            None => StrategyOutcome::NoCandidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ExtractionConfidence;
    use crate::testing::{fixtures, MockRedditApi};

    fn query(
        title: Option<&str>,
        username: Option<&str>,
        subreddit: Option<&str>,
    ) -> ExtractionQuery {
        ExtractionQuery {
            subreddit: subreddit.map(str::to_string),
            username: username.map(str::to_string),
            title: title.map(str::to_string),
            body_snippet: None,
            confidence: ExtractionConfidence::High,
        }
    }

    #[test]
    fn test_default_strategy_order() {
        let names: Vec<_> = default_strategies().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "title_in_subreddit",
                "author_in_subreddit",
                "exact_title",
                "title_with_author",
                "user_comment_history",
            ]
        );
    }

    #[test]
    fn test_applicability() {
        let full = query(Some("A title"), Some("alice"), Some("cats"));
        assert!(default_strategies().iter().all(|s| s.is_applicable(&full)));

        let title_only = query(Some("A title"), None, None);
        let applicable: Vec<_> = default_strategies()
            .into_iter()
            .filter(|s| s.is_applicable(&title_only))
            .map(|s| s.name())
            .collect();
        assert_eq!(applicable, vec!["exact_title"]);
    }

    #[test]
    fn test_generic_username_disables_user_strategies() {
        let q = query(Some("AITA for X"), Some("redacted"), Some("AmItheAsshole"));
        let applicable: Vec<_> = default_strategies()
            .into_iter()
            .filter(|s| s.is_applicable(&q))
            .map(|s| s.name())
            .collect();
        assert_eq!(applicable, vec!["title_in_subreddit", "exact_title"]);
    }

    #[test]
    fn test_outcome_for_error() {
        assert!(matches!(
            outcome_for_error("t", FetchError::NotFound),
            StrategyOutcome::NoCandidates
        ));
        assert!(matches!(
            outcome_for_error("t", FetchError::RateLimited),
            StrategyOutcome::RateLimited
        ));
        assert!(matches!(
            outcome_for_error("t", FetchError::Network("reset".to_string())),
            StrategyOutcome::SoftFailure(_)
        ));
    }

    #[tokio::test]
    async fn test_history_not_found_after_first_page_keeps_best() {
        let api = MockRedditApi::new();
        api.set_handler(|request| {
            Some(match request.param("after") {
                None => Ok(fixtures::page_with_cursor(
                    vec![fixtures::comment(
                        "/r/cats/comments/x/post/c1/",
                        "Cat photos",
                        "alice",
                        "cats",
                        "Cute photo, thanks for sharing",
                    )],
                    "t1_c1",
                )),
                Some(_) => Err(FetchError::NotFound),
            })
        })
        .await;

        let scorer = MatchScorer::new();
        let config = ResolverConfig::default();
        let ctx = StrategyContext::new(&api, &scorer, &config);
        let q = ExtractionQuery {
            body_snippet: Some("something weird happened with my dog".to_string()),
            ..query(None, Some("alice"), None)
        };

        let outcome = UserCommentHistory.run(&ctx, &q).await;

        assert!(matches!(outcome, StrategyOutcome::Scored(_)));
        assert_eq!(ctx.requests(), 2);
    }
}
