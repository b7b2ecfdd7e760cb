//! Engine configuration.
//!
//! Defaults match the documented policy; [`EngineConfig::from_env`] overrides
//! them from `SCHEMAGRAPH_*` environment variables.

use chrono::Duration;
use thiserror::Error;

use crate::validate::DEFAULT_MAX_CONTENT_BYTES;

pub const ENV_MAX_CONTENT_BYTES: &str = "SCHEMAGRAPH_MAX_CONTENT_BYTES";
pub const ENV_SNAPSHOT_THROTTLE_SECS: &str = "SCHEMAGRAPH_SNAPSHOT_THROTTLE_SECS";
pub const ENV_PAGE_SIZE: &str = "SCHEMAGRAPH_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "SCHEMAGRAPH_MAX_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Tunables for [`SaveEngine`](crate::engine::SaveEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Serialized content size ceiling in bytes.
    pub max_content_bytes: usize,
    /// Minimum spacing between automatic snapshots of one project.
    pub snapshot_throttle: Duration,
    /// Page size used when a caller asks for none.
    pub default_page_size: u32,
    /// Upper bound on any requested page size.
    pub max_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            snapshot_throttle: Duration::minutes(5),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl EngineConfig {
    /// Builds a config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();

        if let Some(bytes) = parse::<usize>(&lookup, ENV_MAX_CONTENT_BYTES)? {
            config.max_content_bytes = bytes;
        }
        if let Some(secs) = parse::<u32>(&lookup, ENV_SNAPSHOT_THROTTLE_SECS)? {
            config.snapshot_throttle = Duration::seconds(i64::from(secs));
        }
        if let Some(max) = parse::<u32>(&lookup, ENV_MAX_PAGE_SIZE)? {
            config.max_page_size = nonzero(ENV_MAX_PAGE_SIZE, max)?;
        }
        if let Some(size) = parse::<u32>(&lookup, ENV_PAGE_SIZE)? {
            config.default_page_size = nonzero(ENV_PAGE_SIZE, size)?;
        }
        config.default_page_size = config.default_page_size.min(config.max_page_size);

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn nonzero(key: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        Err(ConfigError {
            key,
            value: value.to_string(),
            reason: "must be at least 1".into(),
        })
    } else {
        Ok(value)
    }
}
