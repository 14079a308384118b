//! Configuration for the HTTP lookup client

use super::defaults::{
    request_timeout, API_KEY_ENV, DEFAULT_SERVER_URL, DEFAULT_USER_AGENT, SERVER_URL_ENV,
};
use reqwest::Url;
use std::time::Duration;

/// Invalid or incomplete configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The server URL could not be parsed or is not http(s)
    #[error("invalid server url {url}: {reason}")]
    InvalidServerUrl {
        /// URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// A timeout of zero would fail every request
    #[error("request timeout must be greater than 0")]
    ZeroTimeout,

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Settings for [`crate::asn::AsnmapClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the lookup endpoint
    pub server_url: String,
    /// API key sent with every request, if any
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent header
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_key: None,
            timeout: request_timeout(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfig builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Defaults, overridden by `ASNMAP_SERVER_URL` and `PDCP_API_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        ClientConfigBuilder::new().with_env().build()
    }

    /// Parsed server URL
    pub fn parsed_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidServerUrl {
            url: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidServerUrl {
                url: self.server_url.clone(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_url()?;
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Apply overrides from the environment, ignoring empty values
    pub fn with_env(mut self) -> Self {
        if let Some(url) = non_empty_env(SERVER_URL_ENV) {
            self.config.server_url = url;
        }
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.config.api_key = Some(key);
        }
        self
    }

    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
