//! Client configuration types and builders.

use std::time::Duration;

use url::Url;

use crate::connection::{DiscoveryRegistry, DiscoveryServer, OnlineHostPolicy};

/// Default maximum number of requests held by one batch.
pub const DEFAULT_MAX_REQUESTS_PER_BATCH: usize = 1000;
/// Default number of retries for auto-retry eligible requests.
const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default pause between retries.
const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for dataverse_core::DataverseError {
    fn from(err: ConfigError) -> Self {
        dataverse_core::DataverseError::Configuration(err.message)
    }
}

/// Retry settings for auto-retry eligible requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    max_retries: u32,
    retry_pause: Duration,
}

impl RetryConfig {
    /// Returns the maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the pause between attempts.
    pub fn retry_pause(&self) -> Duration {
        self.retry_pause
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_RETRY_COUNT,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }
}

/// Builder for [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    max_retries: Option<u32>,
    retry_pause: Option<Duration>,
}

impl RetryConfigBuilder {
    /// Creates a new retry configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the pause between attempts.
    pub fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = Some(pause);
        self
    }

    /// Builds the retry configuration.
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        Ok(RetryConfig {
            max_retries: self.max_retries.unwrap_or(DEFAULT_RETRY_COUNT),
            retry_pause: self.retry_pause.unwrap_or(DEFAULT_RETRY_PAUSE),
        })
    }
}

/// Configuration for a [`DataverseClient`](crate::DataverseClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    service_uri: Url,
    geo: Option<String>,
    host_policy: OnlineHostPolicy,
    registry: DiscoveryRegistry,
    max_requests_per_batch: usize,
    retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the tenant service URI.
    pub fn service_uri(&self) -> &Url {
        &self.service_uri
    }

    /// Returns the geography hint, if any.
    pub fn geo(&self) -> Option<&str> {
        self.geo.as_deref()
    }

    /// Returns the online host policy.
    pub fn host_policy(&self) -> OnlineHostPolicy {
        self.host_policy
    }

    /// Returns the discovery registry.
    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Returns the maximum number of requests a batch may hold.
    pub fn max_requests_per_batch(&self) -> usize {
        self.max_requests_per_batch
    }

    /// Returns the retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    service_uri: Option<String>,
    geo: Option<String>,
    include_internal_hosts: Option<bool>,
    discovery_servers: Option<Vec<DiscoveryServer>>,
    max_requests_per_batch: Option<usize>,
    retry: RetryConfigBuilder,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant service URI, e.g. `https://contoso.crm.dynamics.com`.
    pub fn service_uri(mut self, uri: impl Into<String>) -> Self {
        self.service_uri = Some(uri.into());
        self
    }

    /// Sets the geography hint used to pick the discovery region.
    pub fn geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = Some(geo.into());
        self
    }

    /// Recognises internal test domains as online hosts.
    pub fn include_internal_hosts(mut self, include: bool) -> Self {
        self.include_internal_hosts = Some(include);
        self
    }

    /// Replaces the built-in discovery registry.
    pub fn discovery_servers(mut self, servers: Vec<DiscoveryServer>) -> Self {
        self.discovery_servers = Some(servers);
        self
    }

    /// Appends a discovery server, starting from an empty registry.
    pub fn add_discovery_server(mut self, server: DiscoveryServer) -> Self {
        self.discovery_servers.get_or_insert_with(Vec::new).push(server);
        self
    }

    /// Sets the maximum number of requests a batch may hold.
    pub fn max_requests_per_batch(mut self, max: usize) -> Self {
        self.max_requests_per_batch = Some(max);
        self
    }

    /// Configures retry settings using a builder function.
    pub fn retry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RetryConfigBuilder) -> RetryConfigBuilder,
    {
        self.retry = f(self.retry);
        self
    }

    /// Builds the client configuration, validating all settings.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let raw_uri = self
            .service_uri
            .ok_or_else(|| ConfigError::new("service_uri must be set"))?;
        let service_uri = Url::parse(raw_uri.trim())
            .map_err(|e| ConfigError::new(format!("invalid service_uri '{raw_uri}': {e}")))?;
        if !matches!(service_uri.scheme(), "http" | "https") {
            return Err(ConfigError::new(format!(
                "service_uri must use http or https, got '{}'",
                service_uri.scheme()
            )));
        }

        let max_requests_per_batch = self
            .max_requests_per_batch
            .unwrap_or(DEFAULT_MAX_REQUESTS_PER_BATCH);
        if max_requests_per_batch == 0 {
            return Err(ConfigError::new("max_requests_per_batch must be at least 1"));
        }

        let registry = match self.discovery_servers {
            Some(servers) => {
                if servers.iter().any(|s| s.short_name().is_empty()) {
                    return Err(ConfigError::new(
                        "discovery server short_name must not be empty",
                    ));
                }
                DiscoveryRegistry::new(servers)
            }
            None => DiscoveryRegistry::builtin(),
        };

        let host_policy = match self.include_internal_hosts {
            Some(true) => OnlineHostPolicy::with_internal_hosts(),
            Some(false) => OnlineHostPolicy::production(),
            None => OnlineHostPolicy::default(),
        };

        Ok(ClientConfig {
            service_uri,
            geo: self.geo.filter(|g| !g.trim().is_empty()),
            host_policy,
            registry,
            max_requests_per_batch,
            retry: self.retry.build()?,
        })
    }
}
