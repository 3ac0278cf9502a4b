//! Organization lookup over discovery results.

/// An organization returned by a discovery server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationDetail {
    unique_name: String,
    friendly_name: String,
    web_application_endpoint: String,
}

impl OrganizationDetail {
    /// Creates an organization detail.
    pub fn new(
        unique_name: impl Into<String>,
        friendly_name: impl Into<String>,
        web_application_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            unique_name: unique_name.into(),
            friendly_name: friendly_name.into(),
            web_application_endpoint: web_application_endpoint.into(),
        }
    }

    /// Returns the unique name.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// Returns the friendly name.
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Returns the web application endpoint URL.
    pub fn web_application_endpoint(&self) -> &str {
        &self.web_application_endpoint
    }
}

/// Finds the organization called `name`.
///
/// Tries the unique name, then the friendly name (both ignoring case), then
/// any organization whose web endpoint contains `://{name}.`.
pub fn find_organization<'a>(
    organizations: &'a [OrganizationDetail],
    name: &str,
) -> Option<&'a OrganizationDetail> {
    if name.is_empty() {
        return None;
    }
    if let Some(org) = organizations
        .iter()
        .find(|o| o.unique_name.eq_ignore_ascii_case(name))
    {
        return Some(org);
    }
    if let Some(org) = organizations
        .iter()
        .find(|o| o.friendly_name.eq_ignore_ascii_case(name))
    {
        return Some(org);
    }
    let fragment = format!("://{}.", name.to_lowercase());
    organizations
        .iter()
        .find(|o| o.web_application_endpoint.to_lowercase().contains(&fragment))
}
