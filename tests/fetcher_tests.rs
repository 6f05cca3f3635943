//! Post retrieval tests against an in-memory backend.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use common::{
    credentials, fashion_session, harness, message, photo_message, short_request_timeout,
    FakeSession, LogCapture,
};
use telefeed::config::{AppConfig, Credentials};
use telefeed::telegram::{ConnectionStatus, FetchError, PostSource};

fn no_fallback() -> AppConfig {
    let mut config = AppConfig::default();
    config.telegram.demo_fallback = false;
    config
}

// =============================================================================
// Demo fallback
// =============================================================================

#[tokio::test]
async fn test_missing_credentials_serves_demo_posts() {
    let h = harness(AppConfig::default(), Credentials::default(), fashion_session());

    let posts = h.service.fetch_posts("rogov24", 10).await.unwrap();

    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["rogov24_demo_1", "rogov24_demo_2", "rogov24_demo_3"]);
    let views: Vec<u64> = posts.iter().map(|p| p.views).collect();
    assert_eq!(views, vec![15000, 14000, 13000]);
    assert!(posts.iter().all(|p| p.source == PostSource::Demo));

    let dates: Vec<DateTime<Utc>> = posts
        .iter()
        .map(|p| DateTime::parse_from_rfc3339(&p.date).unwrap().with_timezone(&Utc))
        .collect();
    assert!(dates.windows(2).all(|w| w[0] > w[1]));

    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn test_demo_count_follows_limit() {
    let h = harness(AppConfig::default(), Credentials::default(), FakeSession::default());
    assert_eq!(h.service.fetch_posts("rogov24", 2).await.unwrap().len(), 2);
    assert_eq!(h.service.fetch_posts("rogov24", 50).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_channel_falls_back_to_demo() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());
    let logs = LogCapture::default();

    let posts = {
        let _guard = logs.install();
        h.service.fetch_posts("no_such_channel", 5).await.unwrap()
    };
    assert_eq!(posts.len(), 3);
    assert!(posts.iter().all(|p| p.source == PostSource::Demo));

    let output = logs.contents();
    let line = output
        .lines()
        .find(|line| line.contains("Serving demo posts"))
        .expect("fallback is logged");
    assert!(line.contains("WARN"));
    assert!(line.contains("channel=no_such_channel"));
    assert!(line.contains(r#"category="channel_not_found""#));

    let err = h.service.try_fetch_posts("no_such_channel", 5).await.unwrap_err();
    assert_eq!(err.category(), "channel_not_found");
}

#[tokio::test]
async fn test_fallback_disabled_propagates_errors() {
    let h = harness(no_fallback(), Credentials::default(), fashion_session());
    let err = h.service.fetch_posts("rogov24", 5).await.unwrap_err();
    assert!(matches!(err, FetchError::MissingCredentials(_)));

    let h = harness(no_fallback(), credentials(), fashion_session());
    let err = h.service.fetch_posts("missing", 5).await.unwrap_err();
    assert!(matches!(err, FetchError::ChannelNotFound { .. }));
}

#[tokio::test]
async fn test_message_fetch_failure_is_classified() {
    let h = harness(no_fallback(), credentials(), fashion_session());
    h.connector.session.fail_messages.store(true, Ordering::SeqCst);

    let err = h.service.fetch_posts("rogov24", 5).await.unwrap_err();
    assert_eq!(err.category(), "message_fetch_error");
}

#[tokio::test]
async fn test_stalled_message_stream_times_out() {
    let h = harness(short_request_timeout(false), credentials(), fashion_session());
    h.connector.session.stall_messages.store(true, Ordering::SeqCst);

    let err = h.service.fetch_posts("rogov24", 5).await.unwrap_err();
    assert_eq!(err.category(), "message_fetch_error");
    assert!(err.to_string().contains("Request timeout"));
}

#[tokio::test]
async fn test_stalled_resolve_times_out() {
    let h = harness(short_request_timeout(false), credentials(), fashion_session());
    h.connector.session.stall_resolve.store(true, Ordering::SeqCst);

    let err = h.service.fetch_posts("rogov24", 5).await.unwrap_err();
    assert_eq!(err.category(), "channel_not_found");

    let err = h.service.photo("rogov24", 10).await.unwrap_err();
    assert_eq!(err.category(), "channel_not_found");
}

#[tokio::test]
async fn test_request_timeout_falls_back_to_demo() {
    let h = harness(short_request_timeout(true), credentials(), fashion_session());
    h.connector.session.stall_messages.store(true, Ordering::SeqCst);
    let logs = LogCapture::default();

    let posts = {
        let _guard = logs.install();
        h.service.fetch_posts("rogov24", 5).await.unwrap()
    };
    assert_eq!(posts.len(), 3);
    assert!(posts.iter().all(|p| p.source == PostSource::Demo));
    assert!(logs.contents().contains(r#"category="message_fetch_error""#));

    // Timeouts are not cached
    h.connector.session.stall_messages.store(false, Ordering::SeqCst);
    let posts = h.service.fetch_posts("rogov24", 5).await.unwrap();
    assert!(posts.iter().all(|p| p.source == PostSource::Live));
}

#[tokio::test]
async fn test_connection_failure_serves_demo_and_retries() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());
    h.connector.fail.store(true, Ordering::SeqCst);

    let posts = h.service.fetch_posts("rogov24", 5).await.unwrap();
    assert!(posts.iter().all(|p| p.source == PostSource::Demo));
    assert_eq!(h.service.status().await, ConnectionStatus::Failed);

    h.connector.fail.store(false, Ordering::SeqCst);
    let posts = h.service.fetch_posts("rogov24", 2).await.unwrap();
    assert!(posts.iter().all(|p| p.source == PostSource::Live));
    assert_eq!(h.connector.connects(), 2);
    assert_eq!(h.service.status().await, ConnectionStatus::Connected);
}

// =============================================================================
// Scanning and filtering
// =============================================================================

#[tokio::test]
async fn test_live_posts_filtered_by_views() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());

    let posts = h.service.fetch_posts("rogov24", 10).await.unwrap();

    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["rogov24_10", "rogov24_8", "rogov24_7"]);
    assert!(posts.iter().all(|p| p.views >= 500));
    assert!(posts.iter().all(|p| p.source == PostSource::Live));
    assert_eq!(posts[0].likes, 450);
    assert_eq!(posts[0].comments, 90);
    assert_eq!(posts[0].post_url, "https://t.me/rogov24/10");
}

#[tokio::test]
async fn test_scan_stops_once_limit_reached() {
    let messages = (1..=100).rev().map(|id| message(id, 1_000)).collect();
    let h = harness(
        AppConfig::default(),
        credentials(),
        FakeSession::default().with_channel("busy", messages),
    );

    let posts = h.service.fetch_posts("busy", 4).await.unwrap();
    assert_eq!(posts.len(), 4);
    assert_eq!(posts[0].message_id, 100);
    assert_eq!(h.connector.session.scanned(), 4);
}

#[tokio::test]
async fn test_scan_budget_is_limit_times_factor() {
    let messages = (1..=100).rev().map(|id| message(id, 100)).collect();
    let h = harness(
        AppConfig::default(),
        credentials(),
        FakeSession::default().with_channel("quiet", messages),
    );

    let posts = h.service.fetch_posts("quiet", 4).await.unwrap();
    assert!(posts.is_empty());
    assert_eq!(h.connector.session.scanned(), 20);
}

#[tokio::test]
async fn test_popular_posts_beyond_budget_are_not_seen() {
    // Only the 30th newest message is popular; a limit of 2 scans 10
    let messages = (1..=40)
        .rev()
        .map(|id| message(id, if id == 11 { 50_000 } else { 10 }))
        .collect();
    let h = harness(
        AppConfig::default(),
        credentials(),
        FakeSession::default().with_channel("sparse", messages),
    );

    let posts = h.service.fetch_posts("sparse", 2).await.unwrap();
    assert!(posts.is_empty());
    assert!(h.connector.session.scanned() <= 10);
}

#[tokio::test]
async fn test_photo_posts_use_proxy_path() {
    let h = harness(
        AppConfig::default(),
        credentials(),
        FakeSession::default().with_channel(
            "zarina_brand",
            vec![photo_message(5, 2_000, "photo-5"), message(4, 2_000)],
        ),
    );

    let posts = h.service.fetch_posts("zarina_brand", 2).await.unwrap();
    assert_eq!(posts[0].media_url, "/photo/zarina_brand/5");
    assert!(posts[1].media_url.starts_with("https://"));
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_cached_result_survives_backend_failure() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());

    let first = h.service.fetch_posts("rogov24", 10).await.unwrap();

    h.connector.session.fail_resolve.store(true, Ordering::SeqCst);
    h.connector.session.fail_messages.store(true, Ordering::SeqCst);
    h.clock.advance(Duration::seconds(60));

    let second = h.service.fetch_posts("rogov24", 10).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.connector.session.resolves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_window_boundaries() {
    let h = harness(no_fallback(), credentials(), fashion_session());
    h.service.try_fetch_posts("rogov24", 10).await.unwrap();
    h.connector.session.fail_resolve.store(true, Ordering::SeqCst);

    h.clock.advance(Duration::seconds(299));
    assert!(h.service.try_fetch_posts("rogov24", 10).await.is_ok());

    h.clock.advance(Duration::seconds(2));
    let err = h.service.try_fetch_posts("rogov24", 10).await.unwrap_err();
    assert_eq!(err.category(), "channel_not_found");
}

#[tokio::test]
async fn test_cache_keyed_by_limit() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());

    h.service.fetch_posts("rogov24", 10).await.unwrap();
    h.service.fetch_posts("rogov24", 1).await.unwrap();
    assert_eq!(h.connector.session.resolves.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());
    h.connector.session.fail_messages.store(true, Ordering::SeqCst);

    let demo = h.service.fetch_posts("rogov24", 10).await.unwrap();
    assert!(demo.iter().all(|p| p.source == PostSource::Demo));

    h.connector.session.fail_messages.store(false, Ordering::SeqCst);
    let live = h.service.fetch_posts("rogov24", 10).await.unwrap();
    assert!(live.iter().all(|p| p.source == PostSource::Live));
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_concurrent_fetches_connect_once() {
    let h = harness(AppConfig::default(), credentials(), fashion_session());
    let service = Arc::new(h.service.clone());

    let handles: Vec<_> = ["rogov24", "burimovasasha", "zarina_brand", "rogov24"]
        .into_iter()
        .map(|channel| {
            let service = service.clone();
            tokio::spawn(async move { service.fetch_posts(channel, 3).await })
        })
        .collect();

    for handle in handles {
        let posts = handle.await.unwrap().unwrap();
        assert!(posts.iter().all(|p| p.source == PostSource::Live));
    }
    assert_eq!(h.connector.connects(), 1);

    h.clock.advance(Duration::seconds(600));
    h.service.fetch_posts("rogov24", 3).await.unwrap();
    assert_eq!(h.connector.connects(), 1);
}

// =============================================================================
// Photos
// =============================================================================

#[tokio::test]
async fn test_photo_download() {
    let h = harness(
        AppConfig::default(),
        credentials(),
        FakeSession::default()
            .with_channel("rogov24", vec![photo_message(5, 900, "photo-5"), message(4, 900)])
            .with_photo("photo-5", b"\xff\xd8jpeg", "image/jpeg"),
    );

    let photo = h.service.photo("rogov24", 5).await.unwrap();
    assert_eq!(photo.bytes, b"\xff\xd8jpeg");
    assert_eq!(photo.content_type, "image/jpeg");

    let err = h.service.photo("rogov24", 4).await.unwrap_err();
    assert_eq!(err.category(), "media_download_error");

    let err = h.service.photo("rogov24", 999).await.unwrap_err();
    assert_eq!(err.category(), "media_download_error");

    let err = h.service.photo("unknown", 1).await.unwrap_err();
    assert_eq!(err.category(), "channel_not_found");
}
