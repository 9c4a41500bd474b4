//! Portal configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_STORE_PATH: &str = ".portal-session.json";
pub const DEFAULT_REVALIDATE_SECS: u64 = 4 * 60;
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Single endpoint every action is posted to. No trailing slash.
    pub base_url: String,
    /// Static key attached to login payloads.
    pub api_key: Option<String>,
    pub store_path: PathBuf,
    pub revalidate_every: Duration,
    pub debounce: Duration,
    pub timeouts: HttpTimeouts,
}

impl PortalConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `PORTAL_BASE_URL`
    ///
    /// Optional:
    /// - `PORTAL_API_KEY`
    /// - `PORTAL_STORE_PATH`: default `.portal-session.json`
    /// - `PORTAL_REVALIDATE_SECS`: default 240
    /// - `PORTAL_DEBOUNCE_MS`: default 2000
    /// - `PORTAL_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PORTAL_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("PORTAL_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { var: "PORTAL_BASE_URL" })?;
        let base_url = normalize_base_url(&base_url)?;

        let api_key = lookup("PORTAL_API_KEY").filter(|v| !v.is_empty());
        let store_path = lookup("PORTAL_STORE_PATH")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from);

        let revalidate_secs = parse_u64(&lookup, "PORTAL_REVALIDATE_SECS", DEFAULT_REVALIDATE_SECS)?;
        if revalidate_secs == 0 {
            return Err(ConfigError::Invalid { var: "PORTAL_REVALIDATE_SECS", value: "0".into() });
        }
        let debounce_ms = parse_u64(&lookup, "PORTAL_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?;
        let timeouts = HttpTimeouts {
            request: Duration::from_secs(parse_u64(
                &lookup,
                "PORTAL_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            connect: Duration::from_secs(parse_u64(
                &lookup,
                "PORTAL_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?),
        };

        Ok(Self {
            base_url,
            api_key,
            store_path,
            revalidate_every: Duration::from_secs(revalidate_secs),
            debounce: Duration::from_millis(debounce_ms),
            timeouts,
        })
    }

    /// Config pointing at `base_url` with every other setting at its default.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = base_url.to_owned();
        Self::from_lookup(move |key| (key == "PORTAL_BASE_URL").then(|| base_url.clone()))
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid { var: "PORTAL_BASE_URL", value: raw.to_owned() });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
