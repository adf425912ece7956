use axum::extract;
use axum::response::Json;
use chrono::{DateTime, Utc};
use leetstats_service::cache::StatsCache;
use leetstats_service::metric;
use serde::Serialize;

use super::stats::UpdateInfo;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub info: UpdateInfo,
    pub scheduler_enabled: bool,
    pub has_cached_data: bool,
}

/// Liveness of the server. Always healthy, even when every fetch so far has failed.
pub async fn health(extract::State(cache): extract::State<StatsCache>) -> Json<HealthResponse> {
    metric!(counter("healthcheck") += 1);
    let state = cache.snapshot();

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        info: UpdateInfo::from(&state),
        scheduler_enabled: cache.scheduler_enabled(),
        has_cached_data: state.has_data(),
    })
}
