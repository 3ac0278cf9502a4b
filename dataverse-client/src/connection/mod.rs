//! Endpoint resolution and discovery.

mod discovery;
mod endpoint;
mod organization;

pub use discovery::{DiscoveryRegistry, DiscoveryServer, RegistrySource, StaticRegistrySource};
pub use endpoint::{
    candidate_discovery_key, is_internal_host, on_premise_organization_name, EndpointResolver,
    OnlineHostPolicy, ResolvedEndpoint,
};
pub use organization::{find_organization, OrganizationDetail};
