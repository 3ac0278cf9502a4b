//! Regional endpoint resolution for service URIs.
//!
//! A service URI is classified as online or on-premise from its host name.
//! Online URIs are mapped to a [`DiscoveryServer`], first by an explicit geo
//! hint and then by matching the host against each server's discovery host.

use url::Url;

use super::discovery::{DiscoveryRegistry, DiscoveryServer};

const ONLINE_HOST_SUFFIXES: &[&str] = &[
    "DYNAMICS.COM",
    "DYNAMICS-INT.COM",
    "MICROSOFTDYNAMICS.DE",
    "MICROSOFTDYNAMICS.US",
    "APPSPLATFORM.US",
    "CRM.DYNAMICS.CN",
];

const INTERNAL_HOST_SUFFIXES: &[&str] = &["CRMLIVETIE.COM", "CRMLIVETODAY.COM"];

/// Which host domains count as online.
///
/// Internal test domains are recognised in debug builds by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineHostPolicy {
    include_internal_hosts: bool,
}

impl OnlineHostPolicy {
    /// Production domains only.
    pub const fn production() -> Self {
        Self {
            include_internal_hosts: false,
        }
    }

    /// Production and internal test domains.
    pub const fn with_internal_hosts() -> Self {
        Self {
            include_internal_hosts: true,
        }
    }

    /// Returns true if internal test domains are recognised.
    pub fn includes_internal_hosts(&self) -> bool {
        self.include_internal_hosts
    }

    /// Returns true if `host` belongs to an online domain under this policy.
    pub fn is_online_host(&self, host: &str) -> bool {
        let host = host.to_uppercase();
        ONLINE_HOST_SUFFIXES.iter().any(|s| host.contains(s))
            || (self.include_internal_hosts && INTERNAL_HOST_SUFFIXES.iter().any(|s| host.contains(s)))
    }
}

impl Default for OnlineHostPolicy {
    fn default() -> Self {
        Self {
            include_internal_hosts: cfg!(debug_assertions),
        }
    }
}

/// Returns true if `host` is one of the internal test domains.
///
/// Geo hints are ignored for these hosts.
pub fn is_internal_host(host: &str) -> bool {
    let host = host.to_uppercase();
    INTERNAL_HOST_SUFFIXES.iter().any(|s| host.contains(s))
}

/// Derives the discovery-host fragment for an online host.
///
/// The first label (the organization) and any `api` labels are dropped, e.g.
/// `contoso.api.crm4.dynamics.com` becomes `crm4.dynamics.com`.
pub fn candidate_discovery_key(host: &str) -> String {
    let key = host
        .split('.')
        .filter(|label| !label.is_empty())
        .skip(1)
        .filter(|label| *label != "api")
        .collect::<Vec<_>>()
        .join(".");
    key.trim_end_matches(['.', '/']).to_string()
}

/// Returns the organization name of an on-premise URI: its first path segment.
///
/// Empty when the path has no segment.
pub fn on_premise_organization_name(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|mut segments| segments.next())
        .map(|segment| segment.trim_end_matches('/'))
        .unwrap_or_default()
        .to_string()
}

/// Result of resolving a service URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    is_on_premise: bool,
    organization_name: String,
    region: Option<DiscoveryServer>,
}

impl ResolvedEndpoint {
    /// Returns true for on-premise deployments.
    pub fn is_on_premise(&self) -> bool {
        self.is_on_premise
    }

    /// Returns the organization name derived from the URI.
    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    /// Returns the matched region, if any. Always `None` on-premise.
    pub fn region(&self) -> Option<&DiscoveryServer> {
        self.region.as_ref()
    }

    /// Returns true for an online URI no registry entry matched.
    ///
    /// Callers fall back to a global discovery path in this case.
    pub fn is_region_ambiguous(&self) -> bool {
        !self.is_on_premise && self.region.is_none()
    }
}

/// Resolves service URIs against a [`DiscoveryRegistry`].
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    registry: DiscoveryRegistry,
    policy: OnlineHostPolicy,
}

impl EndpointResolver {
    /// Creates a resolver over `registry` with the default host policy.
    pub fn new(registry: DiscoveryRegistry) -> Self {
        Self {
            registry,
            policy: OnlineHostPolicy::default(),
        }
    }

    /// Replaces the online host policy.
    pub fn with_policy(mut self, policy: OnlineHostPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the registry.
    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Returns the host policy.
    pub fn policy(&self) -> OnlineHostPolicy {
        self.policy
    }

    /// Returns true if `uri` points at an online deployment.
    pub fn is_online(&self, uri: &Url) -> bool {
        uri.host_str().is_some_and(|h| self.policy.is_online_host(h))
    }

    /// Resolves `uri` to a deployment kind, organization name and region.
    ///
    /// A non-empty `geo_hint` takes precedence over host matching unless the
    /// host is an internal test domain. An online URI that matches nothing
    /// resolves with no region; see [`ResolvedEndpoint::is_region_ambiguous`].
    pub fn resolve(&self, uri: &Url, geo_hint: Option<&str>) -> ResolvedEndpoint {
        let host = uri.host_str().unwrap_or_default();

        if !self.policy.is_online_host(host) {
            let organization_name = on_premise_organization_name(uri);
            tracing::debug!(uri = %uri, organization = %organization_name, "resolved on-premise endpoint");
            return ResolvedEndpoint {
                is_on_premise: true,
                organization_name,
                region: None,
            };
        }

        let organization_name = host
            .split('.')
            .find(|label| !label.is_empty())
            .unwrap_or_default()
            .to_string();

        let by_geo = geo_hint
            .filter(|hint| !hint.is_empty() && !is_internal_host(host))
            .and_then(|hint| self.registry.by_geo_code(hint));

        let region = match by_geo {
            Some(server) => Some(server.clone()),
            None => self.match_host(host).cloned(),
        };

        match &region {
            Some(server) => tracing::debug!(
                uri = %uri,
                region = %server.short_name(),
                "resolved online endpoint"
            ),
            None => tracing::debug!(uri = %uri, "no discovery server matched online endpoint"),
        }

        ResolvedEndpoint {
            is_on_premise: false,
            organization_name,
            region,
        }
    }

    /// Returns the registry entry serving an online `uri`, matched by host only.
    pub fn region_for_uri(&self, uri: &Url) -> Option<&DiscoveryServer> {
        let host = uri.host_str()?;
        if !self.policy.is_online_host(host) {
            return None;
        }
        let short_name = self.match_host(host)?.short_name();
        self.registry.by_short_name(short_name)
    }

    fn match_host(&self, host: &str) -> Option<&DiscoveryServer> {
        self.registry.by_host_fragment(&candidate_discovery_key(host))
    }
}
