//! Client configuration
//!
//! [`ClientConfig`] carries transport settings shared by every provider
//! adapter: timeouts, per-provider base URL overrides, polling cadence for
//! long-running operations and custom headers.

use crate::error::{OmniError, Result};
use crate::types::Provider;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Option<Duration>,
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// User agent
    pub user_agent: Option<String>,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
    /// Base URL overrides keyed by provider
    pub base_urls: HashMap<Provider, String>,
    /// Interval between polls of long-running operations; providers use their own default when unset
    pub poll_interval: Option<Duration>,
    /// Upper bound on total polling time; providers use their own default when unset
    pub poll_timeout: Option<Duration>,
    /// Upper bound on poll attempts; providers use their own default when unset
    pub max_poll_attempts: Option<u32>,
    /// Pre-built HTTP client
    pub http_client: Option<reqwest::Client>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(120)),
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: Some(format!("omnigen/{}", env!("CARGO_PKG_VERSION"))),
            headers: HashMap::new(),
            base_urls: HashMap::new(),
            poll_interval: None,
            poll_timeout: None,
            max_poll_attempts: None,
            http_client: None,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Base URL for `provider`, falling back to `default` without a trailing slash.
    pub fn base_url(&self, provider: Provider, default: &str) -> String {
        self.base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// Build a `reqwest::Client` from these settings, or reuse the supplied one.
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        if let Some(client) = &self.http_client {
            return Ok(client.clone());
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
            .build()
            .map_err(|e| OmniError::Configuration(format!("Failed to build HTTP client: {e}")))
    }
}

/// Builder for `ClientConfig`
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: Option<ClientConfig>,
}

impl ClientConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    fn config(&mut self) -> &mut ClientConfig {
        self.config.get_or_insert_with(ClientConfig::default)
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config().timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.config().connect_timeout = connect_timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: Option<S>) -> Self {
        self.config().user_agent = user_agent.map(Into::into);
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config().headers.insert(key.into(), value.into());
        self
    }

    pub fn base_url<S: Into<String>>(mut self, provider: Provider, url: S) -> Self {
        self.config().base_urls.insert(provider, url.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config().poll_interval = Some(interval);
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config().poll_timeout = Some(timeout);
        self
    }

    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config().max_poll_attempts = Some(attempts);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.config().http_client = Some(client);
        self
    }

    pub fn build(mut self) -> ClientConfig {
        self.config.take().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_override_trims_trailing_slash() {
        let config = ClientConfig::builder()
            .base_url(Provider::Ollama, "http://gpu-box:11434/")
            .build();
        assert_eq!(
            config.base_url(Provider::Ollama, "http://localhost:11434"),
            "http://gpu-box:11434"
        );
        assert_eq!(
            config.base_url(Provider::OpenAI, "https://api.openai.com"),
            "https://api.openai.com"
        );
    }

    #[test]
    fn builder_keeps_defaults_for_unset_fields() {
        let config = ClientConfig::builder()
            .poll_interval(Duration::from_millis(10))
            .header("x-team", "media")
            .build();
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.poll_interval, Some(Duration::from_millis(10)));
        assert_eq!(config.headers["x-team"], "media");
        assert!(config.build_http_client().is_ok());
    }
}
