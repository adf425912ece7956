//! The in-memory cache of the latest profile summary.
//!
//! [`StatsCache`] owns the only mutable state of the service. Every fetch attempt, whether
//! started by the background scheduler or by a manual refresh, goes through
//! [`StatsCache::trigger_update`] or the scheduler's tick, and all of them share one fetch
//! gate: at most one fetch is ever in flight.
//!
//! What is kept on failure:
//! - a failed attempt never replaces or clears the cached summary,
//! - `last_attempt` advances on every attempt, `last_success` only on successful ones.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::types::ProfileSummary;
use crate::upstream::{FetchError, ProfileSource};

mod scheduler;

pub use scheduler::SchedulerGuard;

/// A consistent copy of the cache contents and its bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheState {
    /// The summary of the most recent successful fetch.
    pub latest_summary: Option<Arc<ProfileSummary>>,
    /// When the most recent fetch attempt completed, successful or not.
    pub last_attempt: Option<DateTime<Utc>>,
    /// When the most recent successful fetch completed.
    pub last_success: Option<DateTime<Utc>>,
    /// Number of successful fetches since startup.
    pub success_count: u64,
    /// Number of failed fetches since the last successful one.
    pub consecutive_failures: u64,
    /// Number of fetch attempts since startup.
    pub attempt_count: u64,
    /// Description of the last failure, cleared by the next success.
    pub last_error: Option<String>,
}

impl CacheState {
    /// Whether a summary is available, possibly a stale one.
    pub fn has_data(&self) -> bool {
        self.latest_summary.is_some()
    }

    /// Whether the most recent attempt succeeded. `false` if there was no attempt yet.
    pub fn last_attempt_succeeded(&self) -> bool {
        self.attempt_count > 0 && self.last_error.is_none()
    }

    /// Records the outcome of one fetch attempt that completed at `now`.
    ///
    /// Returns whether the attempt succeeded.
    fn apply(&mut self, outcome: Result<ProfileSummary, FetchError>, now: DateTime<Utc>) -> bool {
        let now = match self.last_attempt {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        self.last_attempt = Some(now);
        self.attempt_count += 1;

        match outcome {
            Ok(summary) => {
                self.latest_summary = Some(Arc::new(summary));
                self.last_success = Some(now);
                self.success_count += 1;
                self.consecutive_failures = 0;
                self.last_error = None;
                true
            }
            Err(error) => {
                self.consecutive_failures += 1;
                self.last_error = Some(error.to_string());
                false
            }
        }
    }
}

/// The cache supervisor.
///
/// Cheap to clone, all clones share the same state.
#[derive(Clone)]
pub struct StatsCache {
    inner: Arc<StatsCacheInner>,
}

struct StatsCacheInner {
    source: Arc<dyn ProfileSource>,
    username: String,
    scheduler_config: SchedulerConfig,

    state: Mutex<CacheState>,
    /// Held for the whole duration of a fetch.
    fetch_gate: tokio::sync::Mutex<()>,
    /// Cancels the running background refresh, if any.
    scheduler: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for StatsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsCache")
            .field("username", &self.inner.username)
            .field("scheduler_config", &self.inner.scheduler_config)
            .field("state", &self.snapshot())
            .finish()
    }
}

impl StatsCache {
    /// Creates an empty cache for `username`.
    ///
    /// Nothing is fetched until [`trigger_update`](Self::trigger_update) or
    /// [`start`](Self::start) is called.
    pub fn new(
        source: Arc<dyn ProfileSource>,
        username: impl Into<String>,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let inner = StatsCacheInner {
            source,
            username: username.into(),
            scheduler_config,
            state: Mutex::new(CacheState::default()),
            fetch_gate: tokio::sync::Mutex::new(()),
            scheduler: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// The user whose profile is cached.
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Whether background refreshes are enabled by configuration.
    pub fn scheduler_enabled(&self) -> bool {
        self.inner.scheduler_config.enabled
    }

    /// Returns a copy of the current state.
    ///
    /// The copy is taken under the same lock that updates are applied with, so it never mixes
    /// values of two different attempts.
    pub fn snapshot(&self) -> CacheState {
        self.inner.state.lock().unwrap().clone()
    }

    /// Fetches the profile and applies the outcome to the cache.
    ///
    /// If another fetch is in flight, this waits for it to complete and returns its outcome
    /// instead of fetching a second time. Returns whether the attempt succeeded.
    pub async fn trigger_update(&self) -> bool {
        self.refresh().await.last_attempt_succeeded()
    }

    /// Same as [`trigger_update`](Self::trigger_update), but returns the state as it was right
    /// after the attempt was applied.
    ///
    /// The state is copied under the lock the outcome was applied with, so an attempt that
    /// completes later cannot leak into it.
    pub async fn refresh(&self) -> CacheState {
        let seen_attempts = self.inner.state.lock().unwrap().attempt_count;
        let gate = self.inner.fetch_gate.lock().await;

        {
            // While the gate is held no attempt can complete, so this is the outcome of the
            // attempt that held it before.
            let state = self.inner.state.lock().unwrap();
            if state.attempt_count != seen_attempts {
                metric!(counter("refresh.coalesced") += 1);
                tracing::debug!("Reusing the outcome of a concurrent refresh");
                return state.clone();
            }
        }

        self.update_with_gate(gate, "manual").await
    }

    /// Runs one update unless another fetch is in flight, in which case it is skipped.
    ///
    /// Returns `None` if the update was skipped.
    pub(crate) async fn try_update(&self, trigger: &'static str) -> Option<bool> {
        let Ok(gate) = self.inner.fetch_gate.try_lock() else {
            metric!(counter("refresh.skipped") += 1, "trigger" => trigger);
            tracing::debug!(trigger, "Skipping refresh, another one is in flight");
            return None;
        };

        let state = self.update_with_gate(gate, trigger).await;
        Some(state.last_attempt_succeeded())
    }

    /// Performs the fetch, applies the retention policy and returns the resulting state.
    ///
    /// Taking the gate guard by value ensures callers hold it for the whole attempt.
    async fn update_with_gate(
        &self,
        _gate: MutexGuard<'_, ()>,
        trigger: &'static str,
    ) -> CacheState {
        let username = self.username();
        tracing::info!(username, trigger, "Updating profile stats");
        metric!(counter("refresh.attempt") += 1, "trigger" => trigger);

        let start = Instant::now();
        let outcome = self.inner.source.fetch(username).await;
        metric!(timer("refresh.duration") = start.elapsed());

        match &outcome {
            Ok(_) => {
                metric!(counter("refresh.success") += 1);
                tracing::info!(username, "Profile stats updated");
            }
            Err(error) => {
                metric!(counter("refresh.failure") += 1, "reason" => error.kind());
                match error {
                    FetchError::Network(_) => tracing::warn!(
                        error = error as &dyn std::error::Error,
                        username,
                        "Failed to fetch profile stats, keeping cached data"
                    ),
                    FetchError::RemoteRejected(_) | FetchError::UserNotFound(_) => {
                        tracing::error!(
                            error = error as &dyn std::error::Error,
                            username,
                            "Failed to fetch profile stats, keeping cached data"
                        )
                    }
                }
            }
        }

        let mut state = self.inner.state.lock().unwrap();
        state.apply(outcome, Utc::now());
        metric!(gauge("refresh.consecutive_failures") = state.consecutive_failures);
        state.clone()
    }
}
