use std::fmt;
use std::time::Duration;

use crate::error::{Result, TryOnError};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Configuration for the generation client and asset fetches.
///
/// Use [`TryOnConfig::builder()`] for explicit construction or
/// [`TryOnConfig::from_env()`] to pick up the API key from the process
/// environment.
#[derive(Clone)]
pub struct TryOnConfig {
    /// API key sent with every generation request.
    pub api_key: String,

    /// Base URL of the generation API (no trailing slash).
    pub endpoint: String,

    /// Model used for both garment and composite generation.
    pub model: String,

    /// Timeout for a single generation request.
    pub request_timeout: Duration,

    /// Timeout for fetching a remote preset image.
    pub fetch_timeout: Duration,
}

impl Default for TryOnConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for TryOnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryOnConfig")
            .field("api_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl TryOnConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> TryOnConfigBuilder {
        TryOnConfigBuilder::default()
    }

    /// Read configuration from the environment.
    ///
    /// `GEMINI_API_KEY` (or `API_KEY`) is required. `TRYON_ENDPOINT` and
    /// `TRYON_MODEL` override the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                TryOnError::Config("GEMINI_API_KEY (or API_KEY) is not set".into())
            })?;

        let mut builder = Self::builder().with_api_key(api_key);
        if let Some(endpoint) = lookup("TRYON_ENDPOINT") {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(model) = lookup("TRYON_MODEL") {
            builder = builder.with_model(model);
        }
        Ok(builder.build())
    }

    /// Reject configs that cannot reach the API.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TryOnError::Config("API key is empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(TryOnError::Config("Model name is empty".into()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(TryOnError::Config(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        Ok(())
    }
}

/// Builder for [`TryOnConfig`].
#[derive(Default)]
pub struct TryOnConfigBuilder {
    config: TryOnConfig,
}

impl TryOnConfigBuilder {
    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Point the client at a different API base URL (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the timeout for generation requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the timeout for remote asset fetches.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Build the final [`TryOnConfig`].
    pub fn build(self) -> TryOnConfig {
        self.config
    }
}
