use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level for the server.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A tag name to report the hostname to, for each metric. Defaults to not sending such a tag.
    pub hostname_tag: Option<String>,
    /// A tag name to report the environment to, for each metric. Defaults to not sending such a tag.
    pub environment_tag: Option<String>,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: env::var("STATSD_SERVER").ok(),
            prefix: "leetstats".into(),
            hostname_tag: None,
            environment_tag: None,
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Controls the background refresh of the cached profile.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the profile is refreshed in the background at all.
    ///
    /// When disabled, the cache is only filled by explicit `/api/refresh` calls.
    pub enabled: bool,

    /// Time between two background refreshes.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3600),
        }
    }
}

/// Where and how the GraphQL endpoint is queried.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// The GraphQL endpoint.
    pub url: Url,

    /// Upper bound for each of the two requests of a fetch, including reading the body.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// The timeout for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// The `User-Agent` sent with every request.
    ///
    /// The upstream is known to block clients that do not look like a browser.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://leetcode.com/graphql").expect("valid default upstream url"),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .into(),
        }
    }
}

/// The full server configuration.
///
/// Loaded once at startup from an optional YAML file, then patched from the environment with
/// [`Config::apply_env`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host and port to bind the HTTP webserver to.
    pub bind: String,

    /// The LeetCode user whose profile is cached.
    pub username: String,

    /// Background refresh settings.
    pub scheduler: SchedulerConfig,

    /// The GraphQL endpoint to fetch from.
    pub upstream: UpstreamConfig,

    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    /// DSN to report internal errors to
    pub sentry_dsn: Option<Dsn>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "0.0.0.0:5000".to_owned(),
            username: "Nandu_2007_".to_owned(),
            scheduler: SchedulerConfig::default(),
            upstream: UpstreamConfig::default(),
            logging: Logging::default(),
            metrics: Metrics::default(),
            sentry_dsn: None,
        }
    }
}

impl Config {
    /// Loads the config file at `path`, or the defaults if no path is given.
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(Config::default()),
        }
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        let config: Self = serde_yaml::from_str(&config).context("failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.interval.is_zero() {
            anyhow::bail!("scheduler interval must be positive");
        }
        Ok(())
    }

    /// Applies overrides from the process environment.
    ///
    /// See [`apply_overrides`](Self::apply_overrides) for the recognized variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides looked up through `var`.
    ///
    /// - `LEETCODE_USERNAME` replaces the username.
    /// - `SCHEDULER_INTERVAL_HOURS` sets the refresh interval in whole hours, must be positive.
    /// - `DISABLE_SCHEDULER=1` turns the background refresh off.
    /// - `PORT` replaces the port of the bind address.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = var("LEETCODE_USERNAME") {
            self.username = username;
        }

        if let Some(hours) = var("SCHEDULER_INTERVAL_HOURS") {
            let seconds = hours
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|hours| *hours > 0)
                .and_then(|hours| hours.checked_mul(3600));
            let Some(seconds) = seconds else {
                anyhow::bail!("SCHEDULER_INTERVAL_HOURS must be a positive integer");
            };
            self.scheduler.interval = Duration::from_secs(seconds);
        }

        if let Some(disable) = var("DISABLE_SCHEDULER") {
            self.scheduler.enabled = disable.trim() != "1";
        }

        if let Some(port) = var("PORT") {
            let port: u16 = port.trim().parse().context("PORT must be a valid port")?;
            let mut addr = self.bind_addr()?;
            addr.set_port(port);
            self.bind = addr.to_string();
        }

        Ok(())
    }

    /// Parses the configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("invalid bind address `{}`", self.bind))
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overrides(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::get(None).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:5000");
        assert_eq!(cfg.username, "Nandu_2007_");
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.scheduler.interval, Duration::from_secs(3600));
        assert_eq!(cfg.upstream.timeout, Duration::from_secs(10));
        assert_eq!(cfg.upstream.url.as_str(), "https://leetcode.com/graphql");
    }

    #[test]
    fn test_yaml_sections() {
        let yaml = r#"
            username: someone
            scheduler:
              interval: 30m
            upstream:
              timeout: 2s
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(cfg.username, "someone");
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.scheduler.interval, Duration::from_secs(30 * 60));
        assert_eq!(cfg.upstream.timeout, Duration::from_secs(2));
        assert_eq!(
            cfg.upstream.connect_timeout,
            UpstreamConfig::default().connect_timeout
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides(overrides(&[
            ("LEETCODE_USERNAME", "bob"),
            ("SCHEDULER_INTERVAL_HOURS", "6"),
            ("DISABLE_SCHEDULER", "1"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(cfg.username, "bob");
        assert_eq!(cfg.scheduler.interval, Duration::from_secs(6 * 3600));
        assert!(!cfg.scheduler.enabled);
        assert_eq!(cfg.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_disable_scheduler_only_on_one() {
        let mut cfg = Config::default();
        cfg.apply_overrides(overrides(&[("DISABLE_SCHEDULER", "0")]))
            .unwrap();
        assert!(cfg.scheduler.enabled);

        cfg.apply_overrides(overrides(&[("DISABLE_SCHEDULER", "true")]))
            .unwrap();
        assert!(cfg.scheduler.enabled);
    }

    #[test]
    fn test_invalid_interval() {
        let mut cfg = Config::default();
        assert!(
            cfg.apply_overrides(overrides(&[("SCHEDULER_INTERVAL_HOURS", "0")]))
                .is_err()
        );
        assert!(
            cfg.apply_overrides(overrides(&[("SCHEDULER_INTERVAL_HOURS", "soon")]))
                .is_err()
        );
        // would overflow when converted to seconds
        assert!(
            cfg.apply_overrides(overrides(&[(
                "SCHEDULER_INTERVAL_HOURS",
                "6000000000000000"
            )]))
            .is_err()
        );
        assert_eq!(cfg.scheduler.interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_interval_in_file() {
        let yaml = r#"
            scheduler:
              interval: 0s
        "#;
        let result = Config::from_reader(yaml.as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields() {
        // Unknown fields should not cause failure
        let yaml = r#"
            scheduler:
              not_a_setting: 1h
        "#;
        let cfg = Config::from_reader(yaml.as_bytes());
        assert!(cfg.is_ok());
    }

    #[test]
    fn test_empty_file() {
        // Empty files aren't supported
        let yaml = r#""#;
        let result = Config::from_reader(yaml.as_bytes());
        assert!(result.is_err());
    }
}
