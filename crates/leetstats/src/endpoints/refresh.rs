use axum::extract;
use axum::http::StatusCode;
use axum::response::Json;
use leetstats_service::cache::StatsCache;
use serde::Serialize;

use super::stats::StatsResponse;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: RefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub stats: StatsResponse,
}

/// Fetches the profile right away and responds once the attempt has completed.
///
/// A failed attempt responds with `500`, but still carries whatever is cached.
pub async fn refresh(
    extract::State(cache): extract::State<StatsCache>,
) -> (StatusCode, Json<RefreshResponse>) {
    let state = cache.refresh().await;
    let success = state.last_attempt_succeeded();

    let (status, error) = if success {
        (StatusCode::OK, None)
    } else {
        let error = state
            .last_error
            .clone()
            .unwrap_or_else(|| "failed to fetch profile".to_owned());
        (StatusCode::INTERNAL_SERVER_ERROR, Some(error))
    };

    let response = RefreshResponse {
        status: if success {
            RefreshStatus::Success
        } else {
            RefreshStatus::Error
        },
        error,
        stats: state.into(),
    };

    (status, Json(response))
}
