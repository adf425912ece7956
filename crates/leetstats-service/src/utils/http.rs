use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::config::UpstreamConfig;

/// Creates the [`reqwest::Client`] used for all upstream requests.
///
/// * `timeout` bounds every request from connecting until the body has been read.
/// * The default headers mimic a browser (`User-Agent`, `Accept`), since the upstream tends to
///   reject obvious bots. The `Referer` depends on the queried user and is set per request.
pub fn create_client(config: &UpstreamConfig) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );

    reqwest::ClientBuilder::new()
        .gzip(true)
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}
