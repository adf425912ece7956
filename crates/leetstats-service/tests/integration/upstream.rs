use std::time::Duration;

use leetstats_service::upstream::{FetchError, ProfileSource};
use leetstats_test::{MockResponse, MockUpstream, Operation};
use reqwest::StatusCode;
use serde_json::json;

use crate::utils::client;

#[tokio::test]
async fn test_fetch_full_profile() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();

    let summary = client(&upstream).fetch("alice").await.unwrap();

    assert_eq!(summary.username, "alice");
    assert_eq!(summary.total_solved, 17);
    assert_eq!(summary.ranking, Some(250123));
    assert_eq!(summary.reputation, Some(12));
    assert_eq!(summary.contest_rating, Some(1534.5));
    assert_eq!(summary.contests_attended, 4);
    assert_eq!(summary.global_ranking, Some(98765));
    assert_eq!(summary.streak, 3);
    assert_eq!(summary.total_active_days, 41);
    assert_eq!(summary.active_years, vec![2024, 2025]);
    assert_eq!(summary.submission_calendar.len(), 3);
    assert_eq!(summary.submission_calendar["1735776000"], 5);

    assert_eq!(upstream.hits(Operation::Profile), 1);
    assert_eq!(upstream.hits(Operation::Calendar), 1);
}

#[tokio::test]
async fn test_fetch_without_contest() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_profile(MockResponse::fixture("profile_no_contest.json"));
    upstream.respond_calendar(MockResponse::json(json!({"data": {"matchedUser": null}})));

    let summary = client(&upstream).fetch("alice").await.unwrap();

    insta::assert_json_snapshot!(summary, @r###"
    {
      "username": "alice",
      "total_solved": 17,
      "easy": 10,
      "medium": 5,
      "hard": 2,
      "ranking": 250123,
      "reputation": 12,
      "contest_rating": null,
      "contests_attended": 0,
      "global_ranking": null,
      "streak": 0,
      "total_active_days": 0,
      "active_years": [],
      "submission_calendar": {}
    }
    "###);
}

#[tokio::test]
async fn test_requests_sent() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();

    client(&upstream).fetch("alice").await.unwrap();

    let requests = upstream.requests();
    let operations: Vec<_> = requests.iter().map(|r| r.operation).collect();
    assert_eq!(operations, [Operation::Profile, Operation::Calendar]);

    for request in &requests {
        assert_eq!(request.username.as_deref(), Some("alice"));
        assert_eq!(
            request.referer.as_deref(),
            Some("https://leetcode.com/alice/")
        );
        assert!(request.user_agent.as_deref().unwrap().starts_with("Mozilla/5.0"));
    }
}

#[tokio::test]
async fn test_profile_query_rejected() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_profile(MockResponse::fixture("errors.json"));

    let error = client(&upstream).fetch("alice").await.unwrap_err();

    assert!(matches!(error, FetchError::RemoteRejected(ref message) if message.contains("bogus")));
    // both queries run before errors are inspected
    assert_eq!(upstream.hits(Operation::Calendar), 1);
}

#[tokio::test]
async fn test_calendar_query_rejected() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_calendar(MockResponse::fixture("errors.json"));

    let error = client(&upstream).fetch("alice").await.unwrap_err();

    assert_eq!(error.kind(), "rejected");
}

#[tokio::test]
async fn test_unknown_user() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_profile(MockResponse::fixture("user_not_found.json"));

    let error = client(&upstream).fetch("ghost").await.unwrap_err();

    assert_eq!(error, FetchError::UserNotFound("ghost".into()));
    assert_eq!(error.to_string(), "user `ghost` not found");
}

#[tokio::test]
async fn test_server_error() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_profile(MockResponse::status(StatusCode::INTERNAL_SERVER_ERROR));

    let error = client(&upstream).fetch("alice").await.unwrap_err();

    assert!(matches!(error, FetchError::Network(ref message) if message.contains("500")));
    // a transport failure on the first query skips the second one
    assert_eq!(upstream.hits(Operation::Calendar), 0);
}

#[tokio::test]
async fn test_invalid_body() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_calendar(MockResponse::garbage());

    let error = client(&upstream).fetch("alice").await.unwrap_err();

    assert!(matches!(error, FetchError::Network(ref message) if message.starts_with("invalid response body")));
}

#[tokio::test]
async fn test_calendar_timeout() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_calendar(MockResponse::fixture("calendar.json").delayed(Duration::from_secs(5)));

    let error = client(&upstream).fetch("alice").await.unwrap_err();

    assert_eq!(error, FetchError::Network("request timed out".into()));
}

#[tokio::test]
async fn test_malformed_calendar() {
    leetstats_test::setup();
    let upstream = MockUpstream::new();
    upstream.respond_calendar(MockResponse::fixture("calendar_malformed.json"));

    let summary = client(&upstream).fetch("alice").await.unwrap();

    assert!(summary.submission_calendar.is_empty());
    assert_eq!(summary.streak, 3);
    assert_eq!(summary.total_solved, 17);
}
