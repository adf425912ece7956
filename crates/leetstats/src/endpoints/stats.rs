use std::sync::Arc;

use axum::extract;
use axum::response::Json;
use chrono::{DateTime, Utc};
use leetstats_service::cache::{CacheState, StatsCache};
use leetstats_service::types::ProfileSummary;
use serde::Serialize;

/// Bookkeeping of the refresh cycle, shared by several responses.
#[derive(Debug, Serialize)]
pub struct UpdateInfo {
    /// When the last attempt completed, successful or not.
    pub last_updated: Option<DateTime<Utc>>,
    pub last_successful_update: Option<DateTime<Utc>>,
    /// Number of successful fetches.
    pub update_count: u64,
    /// Failed fetches since the last successful one.
    pub failed_attempts: u64,
}

impl From<&CacheState> for UpdateInfo {
    fn from(state: &CacheState) -> Self {
        Self {
            last_updated: state.last_attempt,
            last_successful_update: state.last_success,
            update_count: state.success_count,
            failed_attempts: state.consecutive_failures,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// The cached summary, `null` until the first successful fetch.
    pub leetcode: Option<Arc<ProfileSummary>>,
    #[serde(flatten)]
    pub info: UpdateInfo,
}

impl From<CacheState> for StatsResponse {
    fn from(state: CacheState) -> Self {
        let info = UpdateInfo::from(&state);
        Self {
            leetcode: state.latest_summary,
            info,
        }
    }
}

pub async fn get_stats(extract::State(cache): extract::State<StatsCache>) -> Json<StatsResponse> {
    Json(cache.snapshot().into())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::Value;

    use crate::test;

    #[tokio::test]
    async fn test_before_first_fetch() {
        test::setup();
        let upstream = test::MockUpstream::new();
        let server = test::server(test::cache(&upstream));

        let response = reqwest::get(server.url("/api/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        insta::assert_json_snapshot!(body, @r###"
        {
          "failed_attempts": 0,
          "last_successful_update": null,
          "last_updated": null,
          "leetcode": null,
          "update_count": 0
        }
        "###);
        assert_eq!(upstream.requests().len(), 0);
    }

    #[tokio::test]
    async fn test_after_fetch() {
        test::setup();
        let upstream = test::MockUpstream::new();
        let cache = test::cache(&upstream);
        assert!(cache.trigger_update().await);
        let server = test::server(cache);

        let response = reqwest::get(server.url("/api/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        let leetcode = &body["leetcode"];
        assert_eq!(leetcode["username"], "alice");
        assert_eq!(leetcode["total_solved"], 17);
        assert_eq!(leetcode["contest_rating"], 1534.5);
        assert_eq!(leetcode["submission_calendar"]["1735689600"], 2);
        assert_eq!(body["update_count"], 1);
        assert_eq!(body["failed_attempts"], 0);
        assert_eq!(body["last_updated"], body["last_successful_update"]);

        let last_updated = body["last_updated"].as_str().unwrap();
        chrono::DateTime::parse_from_rfc3339(last_updated).unwrap();
    }
}
