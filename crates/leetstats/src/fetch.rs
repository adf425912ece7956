use anyhow::{Context, Result};
use leetstats_service::config::Config;
use leetstats_service::upstream::{LeetCodeClient, ProfileSource};

/// Fetches one profile and prints its summary to stdout.
///
/// Nothing is cached; this is meant to check the upstream and the configuration by hand.
pub fn fetch(config: Config, username: Option<String>) -> Result<()> {
    let username = username.unwrap_or(config.username);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(async {
        let client = LeetCodeClient::new(&config.upstream)?;
        tracing::info!(%username, "Fetching profile from {}", config.upstream.url);
        anyhow::Ok(client.fetch(&username).await?)
    })?;

    let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    println!("{json}");

    Ok(())
}
