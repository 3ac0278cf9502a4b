//! Discovery registry: the table of regional discovery servers.

use std::sync::Arc;

use async_trait::async_trait;
use dataverse_core::Result;

/// A regional discovery server entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryServer {
    short_name: String,
    display_name: String,
    geo_code: Option<String>,
    discovery_host: Option<String>,
}

impl DiscoveryServer {
    /// Creates an entry with only a short name.
    pub fn new(short_name: impl Into<String>) -> Self {
        let short_name = short_name.into();
        Self {
            display_name: short_name.clone(),
            short_name,
            geo_code: None,
            discovery_host: None,
        }
    }

    /// Sets the human-readable region name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the geography code matched against geo hints.
    pub fn with_geo_code(mut self, geo_code: impl Into<String>) -> Self {
        self.geo_code = Some(geo_code.into());
        self
    }

    /// Sets the discovery host name, e.g. `disco.crm4.dynamics.com`.
    pub fn with_discovery_host(mut self, host: impl Into<String>) -> Self {
        self.discovery_host = Some(host.into());
        self
    }

    /// Returns the short name, e.g. `EMEA`.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the geography code, if any.
    pub fn geo_code(&self) -> Option<&str> {
        self.geo_code.as_deref().filter(|g| !g.is_empty())
    }

    /// Returns the discovery host, if any.
    pub fn discovery_host(&self) -> Option<&str> {
        self.discovery_host.as_deref().filter(|h| !h.is_empty())
    }
}

// (short name, display name, geo code, discovery host)
const BUILTIN_SERVERS: &[(&str, &str, Option<&str>, &str)] = &[
    ("NAM", "North America", Some("NA"), "disco.crm.dynamics.com"),
    ("SAM", "South America", Some("SA"), "disco.crm2.dynamics.com"),
    ("CAN", "Canada", Some("CA"), "disco.crm3.dynamics.com"),
    ("EMEA", "EMEA", Some("EU"), "disco.crm4.dynamics.com"),
    ("APAC", "Asia Pacific", Some("AS"), "disco.crm5.dynamics.com"),
    ("OCE", "Oceania", Some("OC"), "disco.crm6.dynamics.com"),
    ("JPN", "Japan", Some("JP"), "disco.crm7.dynamics.com"),
    ("IND", "India", Some("IN"), "disco.crm8.dynamics.com"),
    ("GCC", "North America 2", None, "disco.crm9.dynamics.com"),
    ("GBR", "United Kingdom", Some("GB"), "disco.crm11.dynamics.com"),
    ("FRA", "France", Some("FR"), "disco.crm12.dynamics.com"),
    ("ZAF", "South Africa", Some("ZA"), "disco.crm14.dynamics.com"),
    ("UAE", "United Arab Emirates", Some("AE"), "disco.crm15.dynamics.com"),
    ("GER", "Germany", Some("DE"), "disco.crm16.dynamics.com"),
    ("CHE", "Switzerland", Some("CH"), "disco.crm17.dynamics.com"),
    ("NOR", "Norway", Some("NO"), "disco.crm19.dynamics.com"),
    ("KOR", "Korea", Some("KR"), "disco.crm21.dynamics.com"),
    ("USG", "GCC High", None, "disco.crm.microsoftdynamics.us"),
    ("DOD", "DoD", None, "disco.crm.appsplatform.us"),
    ("CHN", "China", Some("CN"), "disco.crm.dynamics.cn"),
    ("DEU", "Germany (sovereign)", None, "disco.crm.microsoftdynamics.de"),
];

/// An ordered, immutable set of discovery servers.
///
/// Cloning is cheap; the entries are shared.
#[derive(Debug, Clone)]
pub struct DiscoveryRegistry {
    servers: Arc<[DiscoveryServer]>,
}

impl DiscoveryRegistry {
    /// Creates a registry from `servers`, keeping their order.
    pub fn new(servers: impl IntoIterator<Item = DiscoveryServer>) -> Self {
        Self {
            servers: servers.into_iter().collect(),
        }
    }

    /// Returns the registry of public commercial and sovereign regions.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_SERVERS.iter().map(|(short, display, geo, host)| {
            let server = DiscoveryServer::new(*short)
                .with_display_name(*display)
                .with_discovery_host(*host);
            match geo {
                Some(geo) => server.with_geo_code(*geo),
                None => server,
            }
        }))
    }

    /// Iterates entries in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveryServer> {
        self.servers.iter()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns true if the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Returns the first entry whose geo code equals `geo_code`.
    pub fn by_geo_code(&self, geo_code: &str) -> Option<&DiscoveryServer> {
        self.servers
            .iter()
            .find(|s| s.geo_code() == Some(geo_code))
    }

    /// Returns the entry with the given short name, ignoring ASCII case.
    pub fn by_short_name(&self, short_name: &str) -> Option<&DiscoveryServer> {
        self.servers
            .iter()
            .find(|s| s.short_name.eq_ignore_ascii_case(short_name))
    }

    /// Returns the first entry whose discovery host contains `key`.
    pub fn by_host_fragment(&self, key: &str) -> Option<&DiscoveryServer> {
        if key.is_empty() {
            return None;
        }
        self.servers
            .iter()
            .find(|s| s.discovery_host().is_some_and(|h| h.contains(key)))
    }
}

impl Default for DiscoveryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FromIterator<DiscoveryServer> for DiscoveryRegistry {
    fn from_iter<I: IntoIterator<Item = DiscoveryServer>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Source the discovery registry is loaded from.
///
/// The registry is loaded once and then read without locking.
#[async_trait]
pub trait RegistrySource: Send + Sync + std::fmt::Debug {
    /// Returns the discovery servers, in match-priority order.
    async fn load(&self) -> Result<Vec<DiscoveryServer>>;
}

/// A registry source backed by a fixed list.
#[derive(Debug, Clone)]
pub struct StaticRegistrySource {
    servers: Vec<DiscoveryServer>,
}

impl StaticRegistrySource {
    /// Creates a source returning `servers`.
    pub fn new(servers: Vec<DiscoveryServer>) -> Self {
        Self { servers }
    }
}

impl Default for StaticRegistrySource {
    fn default() -> Self {
        Self::new(DiscoveryRegistry::builtin().iter().cloned().collect())
    }
}

#[async_trait]
impl RegistrySource for StaticRegistrySource {
    async fn load(&self) -> Result<Vec<DiscoveryServer>> {
        Ok(self.servers.clone())
    }
}

impl DiscoveryRegistry {
    /// Loads a registry from `source`.
    pub async fn load(source: &dyn RegistrySource) -> Result<Self> {
        let servers = source.load().await?;
        tracing::debug!(count = servers.len(), "loaded discovery registry");
        Ok(Self::new(servers))
    }
}
