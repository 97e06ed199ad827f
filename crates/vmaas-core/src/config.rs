//! Configuration types for the provider
//!
//! Connection settings for the cloud-management API and the retry budgets
//! used by the built-in resources.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::{
    CLONE_POLL_ATTEMPT_TIMEOUT, CLONE_POLL_ATTEMPTS, CLONE_POLL_DELAY, DEFAULT_RETRY_DELAY,
    DEFAULT_RETRY_TIMEOUT, RetryPolicy,
};

/// Connection to the cloud-management API
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL, e.g. `https://cmp.example.com`
    pub api_url: String,

    /// Bearer token
    pub api_token: String,

    /// Location query parameter sent with every call
    #[serde(default)]
    pub location: Option<String>,

    /// Space query parameter sent with every call
    #[serde(default)]
    pub space: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl ProviderConfig {
    pub fn new(api_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_token: api_token.into(),
            location: None,
            space: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_url.is_empty() {
            return Err(crate::Error::config("API URL cannot be empty"));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "API URL must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }

        self.retry.validate()
    }
}

// The token never reaches logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("location", &self.location)
            .field("space", &self.space)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Retry budgets, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay between attempts of ordinary calls
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Wall-clock ceiling of ordinary calls
    ///
    /// Default: 7200 (two hours)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between searches when resolving a cloned instance
    #[serde(default = "default_poll_delay_secs")]
    pub poll_delay_secs: u64,

    /// Limit on a single search
    #[serde(default = "default_poll_attempt_timeout_secs")]
    pub poll_attempt_timeout_secs: u64,

    /// Number of searches before giving up
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            timeout_secs: default_timeout_secs(),
            poll_delay_secs: default_poll_delay_secs(),
            poll_attempt_timeout_secs: default_poll_attempt_timeout_secs(),
            poll_attempts: default_poll_attempts(),
        }
    }
}

impl RetryConfig {
    /// Policy applied to every create, update, resize, delete and read call
    pub fn standard_policy(&self) -> RetryPolicy {
        RetryPolicy::standard()
            .with_delay(Duration::from_secs(self.delay_secs))
            .with_deadline(Duration::from_secs(self.timeout_secs))
    }

    /// Policy applied when polling for a just-cloned instance
    pub fn poll_policy(&self) -> RetryPolicy {
        RetryPolicy::custom(
            Duration::from_secs(self.poll_delay_secs),
            Duration::from_secs(self.poll_attempt_timeout_secs),
            self.poll_attempts,
        )
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Retry timeout must be > 0"));
        }
        if self.poll_attempts == 0 {
            return Err(crate::Error::config("Poll attempts must be > 0"));
        }
        if self.poll_attempt_timeout_secs == 0 {
            return Err(crate::Error::config("Poll attempt timeout must be > 0"));
        }
        Ok(())
    }
}

fn default_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY.as_secs()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_RETRY_TIMEOUT.as_secs()
}

fn default_poll_delay_secs() -> u64 {
    CLONE_POLL_DELAY.as_secs()
}

fn default_poll_attempt_timeout_secs() -> u64 {
    CLONE_POLL_ATTEMPT_TIMEOUT.as_secs()
}

fn default_poll_attempts() -> u32 {
    CLONE_POLL_ATTEMPTS
}
