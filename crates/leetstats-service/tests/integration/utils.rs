use std::sync::Arc;
use std::time::Duration;

use leetstats_service::cache::StatsCache;
use leetstats_service::config::{SchedulerConfig, UpstreamConfig};
use leetstats_service::upstream::LeetCodeClient;
use leetstats_test::MockUpstream;

/// Upstream settings pointing at the mock, with a short request timeout.
pub fn upstream_config(upstream: &MockUpstream) -> UpstreamConfig {
    UpstreamConfig {
        url: upstream.url(),
        timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

pub fn client(upstream: &MockUpstream) -> LeetCodeClient {
    LeetCodeClient::new(&upstream_config(upstream)).unwrap()
}

/// A cache backed by the mock upstream, without background refresh.
pub fn cache(upstream: &MockUpstream) -> StatsCache {
    let scheduler = SchedulerConfig {
        enabled: false,
        ..Default::default()
    };
    StatsCache::new(Arc::new(client(upstream)), "alice", scheduler)
}
