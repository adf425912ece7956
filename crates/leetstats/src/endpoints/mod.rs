use axum::Router;
use axum::routing::get;
use leetstats_service::cache::StatsCache;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

mod health;
mod metrics;
mod refresh;
mod stats;

use health::health;
use metrics::MetricsLayer;
use refresh::refresh;
use stats::get_stats;

pub fn create_app(cache: StatsCache) -> Router {
    // The layers here go "top to bottom" according to the reading order here.
    let layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(MetricsLayer)
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/refresh", get(refresh).post(refresh))
        .route("/api/health", get(health))
        .with_state(cache)
        .layer(layer)
}
