use std::sync::Arc;
use std::time::Duration;

use leetstats_service::cache::StatsCache;
use leetstats_service::config::SchedulerConfig;
use leetstats_test::{MockResponse, MockUpstream, Operation};
use reqwest::StatusCode;

use crate::utils::{cache, client};

#[tokio::test]
async fn test_refresh_then_outage() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    let cache = cache(&upstream);

    assert!(cache.trigger_update().await);
    let first = cache.snapshot();
    assert_eq!(first.success_count, 1);
    let cached = first.latest_summary.clone().unwrap();

    upstream.respond_profile(MockResponse::status(StatusCode::BAD_GATEWAY));
    assert!(!cache.trigger_update().await);

    let state = cache.snapshot();
    assert!(Arc::ptr_eq(state.latest_summary.as_ref().unwrap(), &cached));
    assert_eq!(state.last_success, first.last_success);
    assert_eq!(state.consecutive_failures, 1);
    assert!(state.last_attempt >= first.last_attempt);
    assert!(state.last_error.unwrap().contains("502"));
}

#[tokio::test]
async fn test_calendar_rejection_keeps_summary() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    let cache = cache(&upstream);

    assert!(cache.trigger_update().await);
    let cached = cache.snapshot().latest_summary.unwrap();

    // the profile query still succeeds, only the calendar carries GraphQL errors
    upstream.respond_calendar(MockResponse::fixture("errors.json"));
    assert!(!cache.trigger_update().await);

    let state = cache.snapshot();
    assert!(Arc::ptr_eq(state.latest_summary.as_ref().unwrap(), &cached));
    assert_eq!(state.success_count, 1);
    assert_eq!(state.consecutive_failures, 1);
    assert!(state.last_error.unwrap().contains("rejected"));
    assert_eq!(upstream.hits(Operation::Calendar), 2);
}

#[tokio::test]
async fn test_timeout_applies_nothing_partial() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_calendar(
        MockResponse::fixture("calendar.json").delayed(Duration::from_secs(5)),
    );
    let cache = cache(&upstream);

    assert!(!cache.trigger_update().await);

    let state = cache.snapshot();
    assert!(!state.has_data());
    assert_eq!(state.success_count, 0);
    assert_eq!(state.consecutive_failures, 1);
    assert_eq!(upstream.hits(Operation::Profile), 1);
}

#[tokio::test]
async fn test_concurrent_refreshes_share_fetch() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_profile(
        MockResponse::fixture("profile.json").delayed(Duration::from_millis(200)),
    );
    let cache = cache(&upstream);

    let (a, b) = tokio::join!(cache.trigger_update(), cache.trigger_update());

    assert!(a && b);
    assert_eq!(upstream.hits(Operation::Profile), 1);
    assert_eq!(cache.snapshot().attempt_count, 1);
}

#[tokio::test]
async fn test_scheduler_populates_cache() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    let scheduler = SchedulerConfig {
        enabled: true,
        interval: Duration::from_secs(3600),
    };
    let cache = StatsCache::new(Arc::new(client(&upstream)), "alice", scheduler);

    let guard = cache.start().unwrap();
    for _ in 0..50 {
        if cache.snapshot().has_data() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    guard.shutdown().await;

    let state = cache.snapshot();
    assert!(state.has_data());
    assert_eq!(state.attempt_count, 1);
    assert!(!cache.scheduler_running());
}
