// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `ARCHIVE_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("ARCHIVE_AGENT_VERSION");

const DEFAULT_ARCHIVE_DIR: &str = "archives";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Root directory holding `{domain}/{timestamp}/...` snapshots
    pub archive_dir: PathBuf,
    pub listen_addr: String,
    pub user_agent: String,
    /// Timeout for a single HTTP request
    pub fetch_timeout: Duration,
    /// Wall-clock budget for one archive run; unbounded when `None`
    pub crawl_timeout: Option<Duration>,
    /// Maximum number of URLs admitted per run; unbounded when `None`
    pub max_pages: Option<usize>,
    pub cors_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            user_agent: default_user_agent(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            crawl_timeout: None,
            max_pages: None,
            cors_enabled: true,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let archive_dir = lookup("ARCHIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.archive_dir);
        let listen_addr = lookup("LISTEN_ADDR").unwrap_or(defaults.listen_addr);
        let user_agent = lookup("USER_AGENT").unwrap_or(defaults.user_agent);

        let fetch_timeout = parse_number::<u64>(&lookup, "FETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);
        let crawl_timeout =
            parse_number::<u64>(&lookup, "CRAWL_TIMEOUT_SECS")?.map(Duration::from_secs);
        let max_pages = parse_number::<usize>(&lookup, "MAX_PAGES")?;

        let cors_enabled = match lookup("CORS_ENABLED") {
            Some(value) => value
                .parse()
                .map_err(|_| anyhow!("CORS_ENABLED must be 'true' or 'false', got: {}", value))?,
            None => defaults.cors_enabled,
        };

        Ok(Self {
            archive_dir,
            listen_addr,
            user_agent,
            fetch_timeout,
            crawl_timeout,
            max_pages,
            cors_enabled,
        })
    }
}

fn default_user_agent() -> String {
    format!("archive-agent/{}", VERSION)
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a valid number, got: {}", key, value)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = AgentConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.archive_dir, PathBuf::from("archives"));
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert!(config.crawl_timeout.is_none());
        assert!(config.max_pages.is_none());
        assert!(config.cors_enabled);
        assert!(config.user_agent.starts_with("archive-agent/"));
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("ARCHIVE_DIR", "/var/lib/archives"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("USER_AGENT", "TestBot/1.0"),
            ("FETCH_TIMEOUT_SECS", "5"),
            ("CRAWL_TIMEOUT_SECS", "600"),
            ("MAX_PAGES", "250"),
            ("CORS_ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(config.archive_dir, PathBuf::from("/var/lib/archives"));
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.user_agent, "TestBot/1.0");
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.crawl_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.max_pages, Some(250));
        assert!(!config.cors_enabled);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let result = AgentConfig::from_lookup(lookup_from(&[("MAX_PAGES", "lots")]));

        let err = result.unwrap_err().to_string();
        assert!(err.contains("MAX_PAGES"));
    }

    #[test]
    fn test_invalid_bool_is_an_error() {
        let result = AgentConfig::from_lookup(lookup_from(&[("CORS_ENABLED", "yes")]));
        assert!(result.is_err());
    }
}
