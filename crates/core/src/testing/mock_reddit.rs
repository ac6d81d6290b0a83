//! Mock Reddit API for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::reddit::{FetchError, ListingPage, ListingRequest, RedditApi};

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: ListingRequest,
    /// When the request was made.
    pub timestamp: Instant,
}

type Response = Result<ListingPage, FetchError>;

/// A handler that produces responses dynamically from the request.
type RequestHandler = Box<dyn Fn(&ListingRequest) -> Option<Response> + Send + Sync>;

/// Mock implementation of the `RedditApi` trait.
///
/// Provides controllable behavior for testing:
/// - Canned responses per path, optionally per `after` cursor
/// - Recorded requests for assertions
/// - Injected errors and a simulated rate limit
///
/// Paths with no configured response return an empty listing.
///
/// # Example
///
/// ```rust,ignore
/// use sourcefinder_core::testing::{fixtures, MockRedditApi};
///
/// let api = MockRedditApi::new();
/// api.set_page("/r/cats/search", fixtures::page(vec![
///     fixtures::post("/r/cats/comments/abc/my_cat/", "My cat", "alice", "cats"),
/// ])).await;
///
/// let page = api.fetch_listing(&request).await?;
/// assert_eq!(api.request_count(), 1);
/// ```
pub struct MockRedditApi {
    /// Responses keyed by path, or by `path?after=cursor` for later pages.
    responses: Arc<RwLock<HashMap<String, Response>>>,
    /// Recorded requests.
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    /// If set, every request fails with this error.
    fail_all: Arc<RwLock<Option<FetchError>>>,
    /// Request handler consulted before the canned responses.
    handler: Arc<RwLock<Option<RequestHandler>>>,
    /// Requests answered normally before a 429 is simulated.
    rate_limit_after: Arc<RwLock<Option<usize>>>,
    request_count: AtomicUsize,
    cooling_down: AtomicBool,
}

impl std::fmt::Debug for MockRedditApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRedditApi")
            .field("responses", &"<responses>")
            .field("requests", &"<requests>")
            .field("handler", &"<handler>")
            .field("request_count", &self.request_count)
            .field("cooling_down", &self.cooling_down)
            .finish()
    }
}

impl Default for MockRedditApi {
    fn default() -> Self {
        Self::new()
    }
}

fn response_key(path: &str, after: Option<&str>) -> String {
    match after {
        Some(cursor) => format!("{}?after={}", path, cursor),
        None => path.to_string(),
    }
}

impl MockRedditApi {
    /// Create a mock that answers every request with an empty listing.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            fail_all: Arc::new(RwLock::new(None)),
            handler: Arc::new(RwLock::new(None)),
            rate_limit_after: Arc::new(RwLock::new(None)),
            request_count: AtomicUsize::new(0),
            cooling_down: AtomicBool::new(false),
        }
    }

    /// Set the page returned for a path (first page only).
    pub async fn set_page(&self, path: &str, page: ListingPage) {
        self.responses
            .write()
            .await
            .insert(response_key(path, None), Ok(page));
    }

    /// Set the page returned for a path when requested with the given `after` cursor.
    pub async fn set_page_after(&self, path: &str, after: &str, page: ListingPage) {
        self.responses
            .write()
            .await
            .insert(response_key(path, Some(after)), Ok(page));
    }

    /// Make requests for a path (first page only) fail with an error.
    pub async fn set_error(&self, path: &str, error: FetchError) {
        self.responses
            .write()
            .await
            .insert(response_key(path, None), Err(error));
    }

    /// Make every request fail with an error.
    pub async fn fail_all(&self, error: FetchError) {
        *self.fail_all.write().await = Some(error);
    }

    /// Set a handler that can answer requests dynamically.
    ///
    /// Returning `None` falls through to the canned responses.
    pub async fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&ListingRequest) -> Option<Response> + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    /// Answer the first `n` requests normally, then respond with 429 and
    /// enter cooldown. Requests made during cooldown are refused as well.
    pub async fn rate_limit_after(&self, n: usize) {
        *self.rate_limit_after.write().await = Some(n);
    }

    /// Enter or leave the simulated cooldown directly.
    pub fn set_cooling_down(&self, cooling_down: bool) {
        self.cooling_down.store(cooling_down, Ordering::SeqCst);
    }

    /// Get recorded requests.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Paths of recorded requests, in order.
    pub async fn requested_paths(&self) -> Vec<String> {
        self.requests
            .read()
            .await
            .iter()
            .map(|r| r.request.path.clone())
            .collect()
    }

    /// Number of requests made, including refused ones.
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Clear recorded requests and the cooldown.
    pub async fn reset(&self) {
        self.requests.write().await.clear();
        self.request_count.store(0, Ordering::SeqCst);
        self.cooling_down.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl RedditApi for MockRedditApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_listing(&self, request: &ListingRequest) -> Result<ListingPage, FetchError> {
        let seen = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(RecordedRequest {
            request: request.clone(),
            timestamp: Instant::now(),
        });

        if self.cooling_down.load(Ordering::SeqCst) {
            return Err(FetchError::RateLimited);
        }

        if let Some(limit) = *self.rate_limit_after.read().await {
            if seen >= limit {
                self.cooling_down.store(true, Ordering::SeqCst);
                return Err(FetchError::RateLimited);
            }
        }

        if let Some(error) = self.fail_all.read().await.clone() {
            return Err(error);
        }

        if let Some(handler) = self.handler.read().await.as_ref() {
            if let Some(response) = handler(request) {
                return response;
            }
        }

        let key = response_key(&request.path, request.param("after"));
        match self.responses.read().await.get(&key) {
            Some(response) => response.clone(),
            None => Ok(ListingPage::default()),
        }
    }

    fn is_rate_limited(&self) -> bool {
        self.cooling_down.load(Ordering::SeqCst)
    }
}
