//! Fetching of profile summaries from the LeetCode GraphQL endpoint.
//!
//! A fetch consists of two sequential queries, see [`LeetCodeClient::fetch`]. Both have to
//! succeed, otherwise the whole fetch is discarded and a [`FetchError`] is returned.

use std::error::Error;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::types::ProfileSummary;

mod graphql;
mod summary;

use graphql::{
    CALENDAR_QUERY, CalendarData, GraphQlRequest, GraphQlResponse, PROFILE_QUERY, ProfileData,
    Variables,
};

/// Why a fetch produced no summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The upstream could not be reached, timed out, answered with a non-success status or
    /// sent a body that could not be decoded.
    #[error("upstream request failed: {0}")]
    Network(String),
    /// The upstream answered, but reported errors for the query.
    #[error("upstream rejected the query: {0}")]
    RemoteRejected(String),
    /// The queried user does not exist or is not public.
    #[error("user `{0}` not found")]
    UserNotFound(String),
}

impl FetchError {
    /// A short, stable name of the variant, used as metric tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::RemoteRejected(_) => "rejected",
            Self::UserNotFound(_) => "not_found",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Network("request timed out".to_owned());
        }

        let mut source: &dyn Error = &error;
        while let Some(inner) = source.source() {
            source = inner;
        }

        if error.is_decode() {
            Self::Network(format!("invalid response body: {source}"))
        } else {
            Self::Network(source.to_string())
        }
    }
}

/// Something that can produce a [`ProfileSummary`] for a username.
///
/// [`LeetCodeClient`] is the real implementation; the cache only depends on this trait.
#[async_trait]
pub trait ProfileSource: Send + Sync + 'static {
    async fn fetch(&self, username: &str) -> Result<ProfileSummary, FetchError>;
}

/// Client for the LeetCode GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct LeetCodeClient {
    client: reqwest::Client,
    url: Url,
}

impl LeetCodeClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = crate::utils::http::create_client(config)?;
        Ok(Self::with_client(client, config.url.clone()))
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Posts one query and decodes the response envelope.
    ///
    /// GraphQL-level errors are left in the envelope; only transport problems are errors here.
    async fn query<T>(
        &self,
        query: &str,
        username: &str,
    ) -> Result<GraphQlResponse<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let body = GraphQlRequest {
            query,
            variables: Variables { username },
        };

        let response = self
            .client
            .post(self.url.clone())
            .header(header::REFERER, format!("https://leetcode.com/{username}/"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("GraphQL endpoint returned status code {}", status);
            return Err(FetchError::Network(format!("unexpected status {status}")));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProfileSource for LeetCodeClient {
    /// Runs the profile query, then the calendar query, and flattens both.
    ///
    /// The calendar is fetched even when the profile query reported errors; errors of either
    /// query are only inspected once both have completed.
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, username: &str) -> Result<ProfileSummary, FetchError> {
        let start = Instant::now();

        let profile = self.query::<ProfileData>(PROFILE_QUERY, username).await?;
        let calendar = self.query::<CalendarData>(CALENDAR_QUERY, username).await?;

        metric!(timer("upstream.fetch.duration") = start.elapsed());

        if let Some(message) = profile.rejection().or_else(|| calendar.rejection()) {
            return Err(FetchError::RemoteRejected(message));
        }

        let summary = summary::build_summary(
            username,
            profile.data.unwrap_or_default(),
            calendar.data.unwrap_or_default(),
        );

        summary.ok_or_else(|| FetchError::UserNotFound(username.to_owned()))
    }
}
