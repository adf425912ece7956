//! Background refresh of the cache on a fixed interval.

use std::time::Duration;

use sentry::SentryFutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::StatsCache;

/// Keeps the background refresh running.
///
/// Dropping the guard cancels the refresh loop. A fetch that is already in flight is not
/// aborted, it runs to completion and its outcome is still applied.
#[derive(Debug)]
#[must_use = "dropping the guard stops the background refresh"]
pub struct SchedulerGuard {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SchedulerGuard {
    /// Stops the refresh loop and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.await.ok();
        }
    }
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl StatsCache {
    /// Starts refreshing the cache in the background.
    ///
    /// The first refresh happens right away, then one every configured interval. Ticks that
    /// arrive while a fetch is still in flight are skipped. Must be called from within a tokio
    /// runtime.
    ///
    /// Returns `None` without doing anything if the scheduler is disabled by configuration,
    /// configured with a zero interval or already running.
    pub fn start(&self) -> Option<SchedulerGuard> {
        let config = self.inner.scheduler_config;
        if !config.enabled {
            tracing::info!("Background refresh is disabled");
            return None;
        }
        if config.interval.is_zero() {
            tracing::error!("Background refresh needs a positive interval, not starting it");
            return None;
        }

        let token = {
            let mut running = self.inner.scheduler.lock().unwrap();
            if running.as_ref().is_some_and(|token| !token.is_cancelled()) {
                tracing::warn!("Background refresh is already running");
                return None;
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };

        tracing::info!(
            interval = %humantime_serde::re::humantime::format_duration(config.interval),
            "Starting background refresh"
        );
        let refresh = refresh_loop(self.clone(), config.interval, token.clone());
        let task = tokio::spawn(refresh.bind_hub(sentry::Hub::current()));

        Some(SchedulerGuard {
            token,
            task: Some(task),
        })
    }

    /// Stops the background refresh, if it is running.
    pub fn stop(&self) {
        if let Some(token) = self.inner.scheduler.lock().unwrap().take() {
            token.cancel();
        }
    }

    /// Whether a background refresh loop is currently running.
    pub fn scheduler_running(&self) -> bool {
        self.inner
            .scheduler
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

async fn refresh_loop(cache: StatsCache, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick completes immediately, which populates the cache at startup.
    let mut trigger = "startup";
    let mut last_finished: Option<Instant> = None;

    loop {
        let scheduled = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            scheduled = ticker.tick() => scheduled,
        };

        // A tick that came due while the previous update was still running is dropped.
        if last_finished.is_some_and(|finished| scheduled < finished) {
            metric!(counter("refresh.skipped") += 1, "trigger" => "interval");
            tracing::debug!("Skipping refresh tick missed during a running update");
            continue;
        }

        // Run each update in its own task, so that a panic does not end the loop.
        let mut update = tokio::spawn({
            let cache = cache.clone();
            async move { cache.try_update(trigger).await }
        });

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = &mut update => match result {
                Ok(Some(false)) if trigger == "startup" => {
                    tracing::warn!("Initial refresh failed, serving empty cache until the next one");
                }
                Ok(_) => {}
                Err(error) if error.is_panic() => {
                    tracing::error!(error = ?error, "Background refresh panicked");
                }
                Err(_) => {}
            },
        }

        last_finished = Some(Instant::now());
        trigger = "interval";
    }

    tracing::info!("Stopped background refresh");
}
