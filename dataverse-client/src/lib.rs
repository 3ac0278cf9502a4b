//! Client-side plumbing for the Dataverse Web API.
//!
//! This crate resolves a tenant service URI to its regional discovery server,
//! translates typed attribute collections into Web API payloads, and routes
//! requests either into a batch or to an [`Executor`] for immediate
//! execution. The transport itself is supplied by the caller through the
//! [`Executor`] trait.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dataverse_client::{ClientConfig, EndpointResolver};
//!
//! let config = ClientConfig::builder()
//!     .service_uri("https://contoso.api.crm4.dynamics.com")
//!     .build()?;
//! let resolver = EndpointResolver::new(config.registry().clone());
//! let endpoint = resolver.resolve(config.service_uri(), config.geo());
//!
//! assert_eq!(endpoint.organization_name(), "contoso");
//! assert_eq!(endpoint.region().map(|r| r.short_name()), Some("EMEA"));
//! # Ok::<(), dataverse_client::ConfigError>(())
//! ```
//!
//! # Configuration
//!
//! [`ClientConfig`] is built programmatically, from environment variables
//! ([`ClientConfig::from_env`]), or from YAML/TOML files with the
//! `config-file` feature.

#![warn(missing_docs)]

pub mod batch;
pub mod client;
pub mod config;
pub mod config_file;
pub mod connection;
pub mod dynamics;
pub mod executor;
pub mod metadata;

pub use batch::{BatchRouter, BatchStore, BatchTicket, BatchedRequest, InMemoryBatchStore, RequestBatch};
pub use client::DataverseClient;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError, RetryConfig, RetryConfigBuilder};
pub use config_file::{FileConfig, FileDiscoveryServer, FileRetryConfig};
pub use connection::{
    find_organization, DiscoveryRegistry, DiscoveryServer, EndpointResolver, OnlineHostPolicy,
    OrganizationDetail, RegistrySource, ResolvedEndpoint, StaticRegistrySource,
};
pub use dataverse_core::{DataverseError, Result};
pub use executor::{
    should_auto_retry_retrieve, Executor, OrganizationResponse, WebApiMethod, WebApiRequest,
};
pub use metadata::{MetadataCache, MetadataCacheStats};

#[cfg(feature = "config-file")]
pub use config_file::load_config;
