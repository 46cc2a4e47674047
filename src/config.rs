use std::time::Duration;

use serde::Deserialize;

/// Runtime settings for talking to the lease analysis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the backend, without a trailing slash.
    pub api_base_url: String,
    /// Upload (OCR + extraction) request timeout.
    pub upload_timeout_secs: u64,
    /// Timeout for status reads, auth calls and health checks.
    pub status_timeout_secs: u64,
    /// Timeout for a single chat turn.
    pub chat_timeout_secs: u64,
    /// Delay between two status queries.
    pub poll_interval_ms: u64,
    /// Wall-clock budget for one polling loop.
    pub poll_timeout_secs: u64,
    /// Ask the backend to skip vehicle-registry decoding.
    pub fast_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            upload_timeout_secs: 120,
            status_timeout_secs: 10,
            chat_timeout_secs: 30,
            poll_interval_ms: 2_000,
            poll_timeout_secs: 120,
            fast_mode: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let default = Self::default();
        let config = Self {
            api_base_url: match std::env::var("LEASE_API_URL") {
                Ok(url) => normalize_base_url(&url)?,
                Err(_) => default.api_base_url,
            },
            upload_timeout_secs: parse_var("LEASE_UPLOAD_TIMEOUT_SECS", default.upload_timeout_secs)?,
            status_timeout_secs: parse_var("LEASE_STATUS_TIMEOUT_SECS", default.status_timeout_secs)?,
            chat_timeout_secs: parse_var("LEASE_CHAT_TIMEOUT_SECS", default.chat_timeout_secs)?,
            poll_interval_ms: parse_var("LEASE_POLL_INTERVAL_MS", default.poll_interval_ms)?,
            poll_timeout_secs: parse_var("LEASE_POLL_TIMEOUT_SECS", default.poll_timeout_secs)?,
            fast_mode: parse_var("LEASE_FAST_MODE", default.fast_mode)?,
        };

        if config.poll_interval_ms == 0 {
            anyhow::bail!("LEASE_POLL_INTERVAL_MS must be greater than zero");
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Lease API URL: {}", config.api_base_url);
        tracing::debug!(
            "Polling every {}ms for up to {}s",
            config.poll_interval_ms,
            config.poll_timeout_secs
        );

        Ok(config)
    }

    /// Replaces the base URL, validating it the same way `from_env` does.
    pub fn with_base_url(mut self, url: &str) -> anyhow::Result<Self> {
        self.api_base_url = normalize_base_url(url)?;
        Ok(self)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        _ => Ok(default),
    }
}

fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("LEASE_API_URL cannot be empty");
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        anyhow::bail!("LEASE_API_URL must start with http:// or https://");
    }
    url::Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("LEASE_API_URL is not a valid URL: {}", e))?;

    Ok(trimmed.trim_end_matches('/').to_string())
}
