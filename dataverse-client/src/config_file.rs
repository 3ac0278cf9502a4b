//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! File formats deserialize into the mirror structs below, which are then
//! converted into [`ClientConfig`](crate::config::ClientConfig) through the
//! builder so that the same validation applies.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `ClientConfig::from_yaml("dataverse.yaml")`
//! - **TOML** (requires `config-file` feature): `ClientConfig::from_toml("dataverse.toml")`
//! - **Environment Variables** (always available): `ClientConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! service-uri: https://contoso.crm4.dynamics.com
//! geo: EU
//! include-internal-hosts: false
//! max-requests-per-batch: 500
//! retry:
//!   max-retries: 5
//!   retry-pause-ms: 2000
//! discovery-servers:
//!   - short-name: EMEA
//!     display-name: Europe, Middle East and Africa
//!     geo-code: EU
//!     discovery-host: disco.crm4.dynamics.com
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ClientConfigBuilder, ConfigError};
use crate::connection::DiscoveryServer;

/// Top-level file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Tenant service URI.
    pub service_uri: Option<String>,
    /// Geography hint.
    pub geo: Option<String>,
    /// Whether internal test domains count as online hosts.
    pub include_internal_hosts: Option<bool>,
    /// Maximum number of requests per batch.
    pub max_requests_per_batch: Option<usize>,
    /// Retry configuration.
    pub retry: Option<FileRetryConfig>,
    /// Discovery registry replacing the built-in one.
    pub discovery_servers: Option<Vec<FileDiscoveryServer>>,
}

/// File-based retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileRetryConfig {
    /// Maximum number of retries.
    pub max_retries: Option<u32>,
    /// Pause between attempts in milliseconds.
    pub retry_pause_ms: Option<u64>,
}

/// File-based discovery server entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileDiscoveryServer {
    /// Short name, e.g. `EMEA`.
    pub short_name: String,
    /// Display name; defaults to the short name.
    pub display_name: Option<String>,
    /// Geography code.
    pub geo_code: Option<String>,
    /// Discovery host name.
    pub discovery_host: Option<String>,
}

impl From<FileDiscoveryServer> for DiscoveryServer {
    fn from(file: FileDiscoveryServer) -> Self {
        let mut server = DiscoveryServer::new(file.short_name);
        if let Some(name) = file.display_name {
            server = server.with_display_name(name);
        }
        if let Some(geo) = file.geo_code {
            server = server.with_geo_code(geo);
        }
        if let Some(host) = file.discovery_host {
            server = server.with_discovery_host(host);
        }
        server
    }
}

impl TryFrom<FileConfig> for ClientConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = ClientConfigBuilder::new();

        if let Some(uri) = file.service_uri {
            builder = builder.service_uri(uri);
        }

        if let Some(geo) = file.geo {
            builder = builder.geo(geo);
        }

        if let Some(include) = file.include_internal_hosts {
            builder = builder.include_internal_hosts(include);
        }

        if let Some(max) = file.max_requests_per_batch {
            builder = builder.max_requests_per_batch(max);
        }

        if let Some(retry) = file.retry {
            builder = builder.retry(|mut r| {
                if let Some(n) = retry.max_retries {
                    r = r.max_retries(n);
                }
                if let Some(ms) = retry.retry_pause_ms {
                    r = r.retry_pause(Duration::from_millis(ms));
                }
                r
            });
        }

        if let Some(servers) = file.discovery_servers {
            builder = builder.discovery_servers(servers.into_iter().map(Into::into).collect());
        }

        builder.build()
    }
}

impl ClientConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read YAML config file: {e}")))?;
        let file_config: FileConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse YAML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read TOML config file: {e}")))?;
        let file_config: FileConfig = toml_crate::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// This method is always available (no feature flag required).
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `DATAVERSE_SERVICE_URI` | `service_uri` |
    /// | `DATAVERSE_GEO` | `geo` |
    /// | `DATAVERSE_INCLUDE_INTERNAL_HOSTS` | `"true"` or `"false"` |
    /// | `DATAVERSE_MAX_REQUESTS_PER_BATCH` | Maximum requests per batch |
    /// | `DATAVERSE_RETRY_COUNT` | Number of retries |
    /// | `DATAVERSE_RETRY_PAUSE_MS` | Pause between retries in milliseconds |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file_config = FileConfig::default();

        if let Some(val) = lookup("DATAVERSE_SERVICE_URI") {
            file_config.service_uri = Some(val);
        }

        if let Some(val) = lookup("DATAVERSE_GEO") {
            file_config.geo = Some(val);
        }

        if let Some(val) = lookup("DATAVERSE_INCLUDE_INTERNAL_HOSTS") {
            file_config.include_internal_hosts = Some(val.eq_ignore_ascii_case("true"));
        }

        if let Some(val) = lookup("DATAVERSE_MAX_REQUESTS_PER_BATCH") {
            let max = val.parse::<usize>().map_err(|e| {
                ConfigError::new(format!("invalid DATAVERSE_MAX_REQUESTS_PER_BATCH '{val}': {e}"))
            })?;
            file_config.max_requests_per_batch = Some(max);
        }

        if let Some(val) = lookup("DATAVERSE_RETRY_COUNT") {
            if let Ok(n) = val.parse::<u32>() {
                file_config.retry.get_or_insert_with(Default::default).max_retries = Some(n);
            }
        }

        if let Some(val) = lookup("DATAVERSE_RETRY_PAUSE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                file_config.retry.get_or_insert_with(Default::default).retry_pause_ms = Some(ms);
            }
        }

        file_config.try_into()
    }
}

/// Loads a configuration file, auto-detecting format by extension.
///
/// Supports `.yaml`, `.yml`, and `.toml` extensions.
/// Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ClientConfig::from_yaml(path),
        Some("toml") => ClientConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}
