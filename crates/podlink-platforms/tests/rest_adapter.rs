//! Integration tests for `RestAdapter`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no real
//! network traffic is made. Tests cover the OAuth flows (exchange, refresh
//! per auth scheme, revoke availability), the content operations, and the
//! error mapping every caller relies on (429 → rate-limited, 401 → auth
//! rejection, 5xx → transient API error).

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use podlink_core::{ClientCredentials, Platform};
use podlink_platforms::{spec_for, AdapterError, PlatformAdapter, PublishContent, RestAdapter};

fn test_adapter(platform: Platform, server: &MockServer) -> RestAdapter {
    let creds = ClientCredentials {
        client_id: "app-id".to_owned(),
        client_secret: "app-secret".to_owned(),
    };
    RestAdapter::with_base_url(spec_for(platform), creds, 5, &server.uri())
        .expect("failed to build test adapter")
}

// ---------------------------------------------------------------------------
// OAuth flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exchange_code_posts_form_and_parses_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v4/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-123"))
        .and(body_string_contains("client_id=app-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "access_token": "fresh-access",
            "refresh_token": "fresh-refresh",
            "expires_in": 3600,
            "scope": "read write"
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let grant = adapter
        .exchange_code("auth-code-123", "https://app.example/cb")
        .await
        .expect("exchange should succeed");

    assert_eq!(grant.access_token, "fresh-access");
    assert_eq!(grant.refresh_token.as_deref(), Some("fresh-refresh"));
    assert_eq!(grant.expires_in, Some(3600));
    assert_eq!(grant.scope.as_deref(), Some("read write"));
}

#[tokio::test]
async fn refresh_uses_refresh_token_grant_for_oauth_refresh_scheme() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "access_token": "renewed",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Spotify, &server);
    let grant = adapter.refresh("old-refresh").await.expect("refresh should succeed");
    assert_eq!(grant.access_token, "renewed");
    assert!(grant.refresh_token.is_none());
}

#[tokio::test]
async fn refresh_uses_exchange_grant_for_long_lived_token_scheme() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("grant_type=exchange_token"))
        .and(body_string_contains("access_token=current-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "access_token": "extended-token",
            "expires_in": 5184000
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Facebook, &server);
    let grant = adapter.refresh("current-token").await.expect("exchange should succeed");
    assert_eq!(grant.access_token, "extended-token");
}

#[tokio::test]
async fn refresh_is_unsupported_for_signed_request_scheme() {
    let server = MockServer::start().await;
    let adapter = test_adapter(Platform::Twitter, &server);

    let result = adapter.refresh("anything").await;
    assert!(
        matches!(result, Err(AdapterError::Unsupported { operation: "refresh", .. })),
        "expected Unsupported, got: {result:?}"
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn revoke_posts_token_when_endpoint_exists() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v4/revoke"))
        .and(body_string_contains("token=dead-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    adapter.revoke("dead-token").await.expect("revoke should succeed");
}

#[tokio::test]
async fn revoke_is_unsupported_when_platform_has_no_endpoint() {
    let server = MockServer::start().await;
    let adapter = test_adapter(Platform::Instagram, &server);

    let result = adapter.revoke("token").await;
    assert!(
        matches!(result, Err(AdapterError::Unsupported { operation: "revoke", .. })),
        "expected Unsupported, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_response_surfaces_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Tiktok, &server);
    let result = adapter.fetch_profile("tok").await;

    match result {
        Err(AdapterError::RateLimited {
            retry_after_secs, ..
        }) => assert_eq!(retry_after_secs, 17),
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_maps_to_auth_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Spotify, &server);
    let result = adapter.fetch_profile("tok").await;

    assert!(
        matches!(&result, Err(e @ AdapterError::Auth { .. }) if e.is_auth_rejection()),
        "expected Auth, got: {result:?}"
    );
}

#[tokio::test]
async fn server_error_maps_to_transient_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let result = adapter.fetch_profile("tok").await;

    match result {
        Err(e @ AdapterError::Api { status: 503, .. }) => assert!(e.is_transient()),
        other => panic!("expected Api(503), got: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_maps_to_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let result = adapter.fetch_profile("tok").await;

    assert!(
        matches!(result, Err(AdapterError::Deserialize { .. })),
        "expected Deserialize, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Content operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_profile_parses_identity() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "id": "chan-42",
            "handle": "thedailybrew",
            "display_name": "The Daily Brew"
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let profile = adapter.fetch_profile("tok").await.unwrap();
    assert_eq!(profile.id, "chan-42");
    assert_eq!(profile.handle.as_deref(), Some("thedailybrew"));
}

#[tokio::test]
async fn publish_returns_platform_identity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "platform_content_id": "vid-9",
            "url": "https://yt.example/vid-9"
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let receipt = adapter
        .publish(
            "tok",
            &PublishContent {
                title: "Episode 12".to_owned(),
                description: Some("Show notes".to_owned()),
                media_ref: Some("media/ep12.mp4".to_owned()),
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.platform_content_id, "vid-9");
    assert_eq!(receipt.url, "https://yt.example/vid-9");
}

#[tokio::test]
async fn list_content_passes_cursor_and_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/channels/chan-1/content"))
        .and(query_param("limit", "50"))
        .and(query_param("page_token", "cursor-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "items": [
                {"external_id": "a", "title": "A", "published_at": null},
                {"external_id": "b", "title": "B", "published_at": "2026-08-01T00:00:00Z"}
            ],
            "next_page_token": "cursor-3"
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let page = adapter
        .list_content("tok", "chan-1", Some("cursor-2"))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.next_page_token.as_deref(), Some("cursor-3"));
}

#[tokio::test]
async fn fetch_content_detail_batches_ids_into_one_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/content"))
        .and(query_param("ids", "a,b,c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "items": [
                {
                    "external_id": "a",
                    "title": "A",
                    "description": null,
                    "published_at": null,
                    "metrics": {"views": 10, "likes": 2, "comments": 1, "shares": 0}
                },
                {"external_id": "b", "title": "B"},
                {"external_id": "c", "title": "C"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let items = adapter
        .fetch_content_detail("tok", &["a".to_owned(), "b".to_owned(), "c".to_owned()])
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].metrics.views, 10);
    // Missing metrics default to zero.
    assert!(items[1].metrics.is_zero());
}

#[tokio::test]
async fn list_comments_parses_threads_with_replies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/content/vid-1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "threads": [{
                "external_id": "c1",
                "author": "ana",
                "text": "great episode",
                "like_count": 4,
                "published_at": null,
                "replies": [{
                    "external_id": "c1-r1",
                    "author": "ben",
                    "text": "agreed",
                    "like_count": 1,
                    "published_at": null
                }]
            }],
            "next_page_token": null
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(Platform::Youtube, &server);
    let page = adapter.list_comments("tok", "vid-1", None).await.unwrap();

    assert_eq!(page.threads.len(), 1);
    assert_eq!(page.threads[0].replies.len(), 1);
    assert_eq!(page.threads[0].replies[0].external_id, "c1-r1");
    assert!(page.next_page_token.is_none());
}
