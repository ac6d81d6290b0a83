//! Reddit client integration tests against a local HTTP server.
//!
//! Verify the wire behavior the resolver depends on: User-Agent, status
//! mapping, adaptive pacing, the 429 cooldown and the OAuth fallback.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sourcefinder_core::{
    reddit::RateLimitState,
    testing::fixtures,
    FetchError, ListingRequest, PacingConfig, RedditApi, RedditClient, RedditConfig,
    ResolverConfig, Resolver,
};

const USER_AGENT: &str = "rust:sourcefinder-tests:v0 (contact test@example.com)";
const TITLE: &str = "My cat did something weird";

fn reddit_config(server: &MockServer) -> RedditConfig {
    RedditConfig {
        user_agent: USER_AGENT.to_string(),
        base_url: server.uri(),
        oauth_base_url: format!("{}/oauth", server.uri()),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn oauth_config(server: &MockServer) -> RedditConfig {
    RedditConfig {
        client_id: Some("app-id".to_string()),
        client_secret: Some("app-secret".to_string()),
        ..reddit_config(server)
    }
}

/// Fast pacing so tests do not sleep for seconds.
fn fast_pacing() -> PacingConfig {
    PacingConfig {
        authenticated_delay_ms: 10,
        unauthenticated_delay_ms: 20,
        max_delay_ms: 1000,
        cooldown_ms: 60_000,
        ..Default::default()
    }
}

fn listing(children: serde_json::Value, after: Option<&str>) -> serde_json::Value {
    json!({
        "kind": "Listing",
        "data": { "children": children, "after": after }
    })
}

fn post_thing(id: &str, title: &str, author: &str, subreddit: &str) -> serde_json::Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "title": title,
            "author": author,
            "subreddit": subreddit,
            "selftext": "",
            "permalink": format!("/r/{}/comments/{}/post/", subreddit, id),
            "created_utc": 1_700_000_000.0
        }
    })
}

#[tokio::test]
async fn test_listing_parsed_with_user_agent() {
    let server = MockServer::start().await;
    let body = listing(
        json!([
            post_thing("abc", TITLE, "someone", "cats"),
            {
                "kind": "t1",
                "data": {
                    "link_title": TITLE,
                    "author": "commenter",
                    "subreddit": "cats",
                    "body": "Mine does that too",
                    "permalink": "/r/cats/comments/abc/post/c1/"
                }
            },
            { "kind": "t5", "data": { "display_name": "cats" } }
        ]),
        Some("t3_abc"),
    );

    Mock::given(method("GET"))
        .and(path("/r/cats/search.json"))
        .and(query_param("q", "cat something weird"))
        .and(query_param("restrict_sr", "on"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = RedditClient::new(reddit_config(&server), fast_pacing()).unwrap();
    let request = ListingRequest::subreddit_search("cats", "cat something weird", 25).unwrap();
    let page = client.fetch_listing(&request).await.unwrap();

    assert_eq!(page.candidates.len(), 2);
    assert_eq!(page.after.as_deref(), Some("t3_abc"));

    let post = &page.candidates[0];
    assert!(!post.is_comment());
    assert_eq!(post.title, TITLE);
    assert!(post.body_text.is_none());
    assert!(post.created_at.is_some());

    let comment = &page.candidates[1];
    assert!(comment.is_comment());
    assert_eq!(comment.title, TITLE);
    assert_eq!(comment.body_text.as_deref(), Some("Mine does that too"));
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/ghost123/comments.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = RedditClient::new(reddit_config(&server), fast_pacing()).unwrap();
    let request = ListingRequest::user_comments("ghost123", 100, None).unwrap();

    assert_eq!(
        client.fetch_listing(&request).await.unwrap_err(),
        FetchError::NotFound
    );
    assert!(!client.is_rate_limited());
}

#[tokio::test]
async fn test_server_error_maps_to_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = RedditClient::new(reddit_config(&server), fast_pacing()).unwrap();
    let err = client
        .fetch_listing(&ListingRequest::search("q", 25))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::Http {
            status: 503,
            message: "upstream unavailable".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_body_maps_to_parse() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = RedditClient::new(reddit_config(&server), fast_pacing()).unwrap();
    let err = client
        .fetch_listing(&ListingRequest::search("q", 25))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Parse(_)));
}

#[tokio::test]
async fn test_rate_limit_doubles_delay_and_cools_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let client = RedditClient::new(reddit_config(&server), fast_pacing()).unwrap();
    let request = ListingRequest::search("q", 25);

    assert_eq!(
        client.fetch_listing(&request).await.unwrap_err(),
        FetchError::RateLimited
    );

    let state = client.rate_limit_state();
    assert_eq!(state.current_delay(), Duration::from_millis(40));
    let remaining = state
        .rate_limited_until()
        .expect("cooldown set")
        .duration_since(Instant::now());
    assert!(remaining > Duration::from_secs(59));
    assert!(remaining <= Duration::from_secs(60));
    assert!(client.is_rate_limited());

    // Refused locally; the server expects exactly one request.
    assert_eq!(
        client.fetch_listing(&request).await.unwrap_err(),
        FetchError::RateLimited
    );
}

#[tokio::test]
async fn test_success_decays_delay_toward_floor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(json!([]), None)))
        .mount(&server)
        .await;

    let pacing = PacingConfig {
        cooldown_ms: 0,
        ..fast_pacing()
    };
    let mut state = RateLimitState::new(Duration::from_millis(20), &pacing);
    state.record_rate_limited(Instant::now());
    assert_eq!(state.current_delay(), Duration::from_millis(40));

    let client = RedditClient::with_state(reddit_config(&server), pacing, state).unwrap();
    client
        .fetch_listing(&ListingRequest::search("q", 25))
        .await
        .unwrap();

    assert_eq!(
        client.rate_limit_state().current_delay(),
        Duration::from_millis(32)
    );
}

#[tokio::test]
async fn test_server_error_keeps_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let pacing = PacingConfig {
        cooldown_ms: 0,
        ..fast_pacing()
    };
    let mut state = RateLimitState::new(Duration::from_millis(20), &pacing);
    state.record_rate_limited(Instant::now());

    let client = RedditClient::with_state(reddit_config(&server), pacing, state).unwrap();
    let result = client
        .fetch_listing(&ListingRequest::search("q", 25))
        .await;

    assert!(matches!(result, Err(FetchError::Http { status: 503, .. })));
    assert_eq!(
        client.rate_limit_state().current_delay(),
        Duration::from_millis(40)
    );
}

#[tokio::test]
async fn test_not_found_relaxes_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/ghost123/comments.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pacing = PacingConfig {
        cooldown_ms: 0,
        ..fast_pacing()
    };
    let mut state = RateLimitState::new(Duration::from_millis(20), &pacing);
    state.record_rate_limited(Instant::now());

    let client = RedditClient::with_state(reddit_config(&server), pacing, state).unwrap();
    let result = client
        .fetch_listing(&ListingRequest::user_comments("ghost123", 25, None).unwrap())
        .await;

    assert!(matches!(result, Err(FetchError::NotFound)));
    assert_eq!(
        client.rate_limit_state().current_delay(),
        Duration::from_millis(32)
    );
}

#[tokio::test]
async fn test_consecutive_requests_are_spaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(json!([]), None)))
        .expect(3)
        .mount(&server)
        .await;

    let pacing = PacingConfig {
        unauthenticated_delay_ms: 100,
        ..fast_pacing()
    };
    let client = Arc::new(RedditClient::new(reddit_config(&server), pacing).unwrap());
    let request = ListingRequest::search("q", 25);

    let start = Instant::now();
    let results = futures::future::join_all((0..3).map(|_| {
        let client = client.clone();
        let request = request.clone();
        async move { client.fetch_listing(&request).await }
    }))
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    // Three dispatches need two full gaps even when issued concurrently.
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_oauth_token_used_on_oauth_host() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok123",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "*"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/search"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(json!([]), None)))
        .expect(2)
        .mount(&server)
        .await;

    let client = RedditClient::new(oauth_config(&server), fast_pacing()).unwrap();
    let request = ListingRequest::search("q", 25);

    client.fetch_listing(&request).await.unwrap();
    client.fetch_listing(&request).await.unwrap();

    assert_eq!(
        client.rate_limit_state().base_delay(),
        Duration::from_millis(10)
    );
}

#[tokio::test]
async fn test_token_failure_falls_back_to_public_host() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": 401})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(json!([]), None)))
        .expect(2)
        .mount(&server)
        .await;

    let client = RedditClient::new(oauth_config(&server), fast_pacing()).unwrap();
    let request = ListingRequest::search("q", 25);

    client.fetch_listing(&request).await.unwrap();
    // Within the retry backoff: no second exchange.
    client.fetch_listing(&request).await.unwrap();

    assert_eq!(
        client.rate_limit_state().base_delay(),
        Duration::from_millis(20)
    );
}

#[tokio::test]
async fn test_rejected_token_is_exchanged_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok123",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/search"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = RedditClient::new(oauth_config(&server), fast_pacing()).unwrap();
    let request = ListingRequest::search("q", 25);

    for _ in 0..2 {
        let err = client.fetch_listing(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 401, .. }));
    }
}

#[tokio::test]
async fn test_resolution_halts_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/cats/search.json"))
        .and(query_param("q", "author:alice"))
        .respond_with(ResponseTemplate::new(429))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/cats/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            json!([post_thing("xyz", TITLE, "bob", "dogs")]),
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(RedditClient::new(reddit_config(&server), fast_pacing()).unwrap());
    let resolver = Resolver::new(client.clone(), ResolverConfig::default());

    let query = fixtures::query(Some("cats"), Some("alice"), Some(TITLE));
    let result = resolver.resolve(&query).await;

    let matched = result.as_match().expect("best prior result returned");
    assert_eq!(matched.url, "https://www.reddit.com/r/dogs/comments/xyz/post/");
    assert!((matched.match_confidence - 0.75).abs() < 1e-9);

    let state = client.rate_limit_state();
    assert_eq!(state.current_delay(), Duration::from_millis(40));
    assert!(client.is_rate_limited());

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 2);
}
