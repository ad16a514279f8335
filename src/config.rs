//! Client configuration

use crate::errors::{Result, TableError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for a [`TableClient`](crate::client::TableClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base endpoint of the table service, e.g. `https://account.table.example.net/`
    pub endpoint: Url,
    /// Client behavior settings
    pub settings: ClientSettings,
}

/// Client behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Request timeout in seconds
    pub timeout: u64,
    /// User-Agent header value sent with every request
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: format!("tablestore-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default settings
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TableError::InvalidArgument(format!("invalid endpoint: {}", e)))?;
        Ok(Self {
            endpoint,
            settings: ClientSettings::default(),
        })
    }
}

/// Fluent builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    endpoint: Option<String>,
    settings: ClientSettings,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service endpoint
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    /// Set the request timeout in seconds
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.settings.timeout = seconds;
        self
    }

    /// Override the User-Agent header
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.settings.user_agent = user_agent.to_string();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| TableError::InvalidArgument("no endpoint configured".to_string()))?;
        let mut config = ClientConfig::new(&endpoint)?;
        config.settings = self.settings;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new()
            .endpoint("https://account.table.example.net/")
            .build()
            .unwrap();
        assert_eq!(config.settings.timeout, 30);
        assert!(config.settings.user_agent.starts_with("tablestore-rs/"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .endpoint("https://account.table.example.net/")
            .timeout(5)
            .user_agent("test-agent/1.0")
            .build()
            .unwrap();
        assert_eq!(config.settings.timeout, 5);
        assert_eq!(config.settings.user_agent, "test-agent/1.0");
    }

    #[test]
    fn test_missing_endpoint_fails() {
        let err = ConfigBuilder::new().build().unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_invalid_endpoint_fails() {
        assert!(ClientConfig::new("not a url").is_err());
    }
}
