//! Client configuration.

use crate::error::{DeliveryError, ErrorCode, XaseResult};
use crate::hooks::DeliveryHooks;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/xase/v1";

/// Environment variable that overrides the default base URL.
pub const BASE_URL_ENV: &str = "XASE_BASE_URL";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_QUEUE_MAX_SIZE: usize = 10_000;

/// Configuration for [`crate::XaseClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API key sent as `X-API-Key` (required).
    pub api_key: String,
    /// API base URL. `None` falls back to `XASE_BASE_URL`, then [`DEFAULT_BASE_URL`].
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Route records through the background queue by default.
    pub fire_and_forget: bool,
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Backoff delay for attempt 0.
    pub base_delay: Duration,
    /// Backoff cap, applied before jitter.
    pub max_delay: Duration,
    /// Queue capacity; the oldest record is dropped on overflow.
    pub queue_max_size: usize,
    /// Outcome callbacks for queued records.
    pub hooks: Option<Arc<dyn DeliveryHooks>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            fire_and_forget: true,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            queue_max_size: DEFAULT_QUEUE_MAX_SIZE,
            hooks: None,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden from `XASE_*` environment variables.
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    fn load_from_env(&mut self) {
        if let Some(api_key) = env_non_empty("XASE_API_KEY") {
            self.api_key = api_key;
        }
        if let Some(base_url) = env_non_empty(BASE_URL_ENV) {
            self.base_url = Some(base_url);
        }
        if let Some(timeout) = env_parse::<f64>("XASE_TIMEOUT_SECS").and_then(timeout_from_secs) {
            self.timeout = timeout;
        }
        if let Some(enabled) = env_parse::<bool>("XASE_FIRE_AND_FORGET") {
            self.fire_and_forget = enabled;
        }
        if let Some(max_retries) = env_parse::<u32>("XASE_MAX_RETRIES") {
            self.max_retries = max_retries;
        }
        if let Some(size) = env_parse::<usize>("XASE_QUEUE_MAX_SIZE") {
            self.queue_max_size = size;
        }
    }

    /// Set the outcome callbacks.
    pub fn with_hooks(mut self, hooks: Arc<dyn DeliveryHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Resolved base URL without a trailing slash.
    ///
    /// Explicit value first, then `XASE_BASE_URL`, then the default. The result
    /// must be an absolute http(s) URL.
    pub fn resolve_base_url(&self) -> XaseResult<String> {
        let raw = self
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| env_non_empty(BASE_URL_ENV))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let trimmed = raw.trim().trim_end_matches('/').to_string();

        let parsed =
            Url::parse(&trimmed).map_err(|e| DeliveryError::wrap(ErrorCode::InvalidConfig, &e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DeliveryError::new(
                ErrorCode::InvalidConfig,
                format!("Unsupported base URL scheme: {}", parsed.scheme()),
            ));
        }

        Ok(trimmed)
    }

    /// Fails with `MISSING_API_KEY` when the key is blank.
    pub(crate) fn require_api_key(&self) -> XaseResult<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(DeliveryError::new(ErrorCode::MissingApiKey, "API key is required"));
        }
        Ok(key)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("fire_and_forget", &self.fire_and_forget)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("queue_max_size", &self.queue_max_size)
            .field("hooks", &self.hooks.is_some())
            .finish_non_exhaustive()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_non_empty(name).and_then(|raw| raw.parse().ok())
}

/// Positive timeouts only; NaN, negative, zero and overflowing values are ignored.
fn timeout_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|timeout| !timeout.is_zero())
}
