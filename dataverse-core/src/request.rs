//! Organization request model.

use uuid::Uuid;

use crate::value::{AttributeValue, Entity, EntityReference, OptionSetValue};

/// Optional request parameter asking the server to skip custom plugin logic.
///
/// Only honored when the caller holds the bypass-plugins privilege; otherwise
/// the server faults the request.
pub const BYPASS_CUSTOM_PLUGIN_EXECUTION: &str = "BypassCustomPluginExecution";

/// Value carried by a request parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestParameter {
    /// A record.
    Entity(Entity),
    /// A scalar or reference value.
    Value(AttributeValue),
}

impl From<Entity> for RequestParameter {
    fn from(entity: Entity) -> Self {
        RequestParameter::Entity(entity)
    }
}

impl From<AttributeValue> for RequestParameter {
    fn from(value: AttributeValue) -> Self {
        RequestParameter::Value(value)
    }
}

macro_rules! impl_value_parameter {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RequestParameter {
                fn from(value: $ty) -> Self {
                    RequestParameter::Value(value.into())
                }
            }
        )*
    };
}

impl_value_parameter!(EntityReference, OptionSetValue, bool, i32, String, &str, Uuid);

/// A named organization message with ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationRequest {
    request_name: String,
    parameters: Vec<(String, RequestParameter)>,
}

impl OrganizationRequest {
    /// Creates a request with no parameters.
    pub fn new(request_name: impl Into<String>) -> Self {
        Self {
            request_name: request_name.into(),
            parameters: Vec::new(),
        }
    }

    /// Sets a parameter, replacing an existing one with the same name.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<RequestParameter>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.parameters.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.parameters.push((name, value)),
        }
        self
    }

    /// `Create` message for `target`.
    pub fn create(target: Entity) -> Self {
        Self::new("Create").with_parameter("Target", target)
    }

    /// `Update` message for `target`.
    pub fn update(target: Entity) -> Self {
        Self::new("Update").with_parameter("Target", target)
    }

    /// `Upsert` message for `target`.
    pub fn upsert(target: Entity) -> Self {
        Self::new("Upsert").with_parameter("Target", target)
    }

    /// `Delete` message for `target`.
    pub fn delete(target: EntityReference) -> Self {
        Self::new("Delete").with_parameter("Target", target)
    }

    /// `WinQuote` message.
    pub fn win_quote(quote_close: Entity, status: OptionSetValue) -> Self {
        Self::new("WinQuote")
            .with_parameter("QuoteClose", quote_close)
            .with_parameter("Status", status)
    }

    /// `CloseQuote` message.
    pub fn close_quote(quote_close: Entity, status: OptionSetValue) -> Self {
        Self::new("CloseQuote")
            .with_parameter("QuoteClose", quote_close)
            .with_parameter("Status", status)
    }

    /// `WinOpportunity` message.
    pub fn win_opportunity(opportunity_close: Entity, status: OptionSetValue) -> Self {
        Self::new("WinOpportunity")
            .with_parameter("OpportunityClose", opportunity_close)
            .with_parameter("Status", status)
    }

    /// `LoseOpportunity` message.
    pub fn lose_opportunity(opportunity_close: Entity, status: OptionSetValue) -> Self {
        Self::new("LoseOpportunity")
            .with_parameter("OpportunityClose", opportunity_close)
            .with_parameter("Status", status)
    }

    /// `CloseIncident` message.
    pub fn close_incident(incident_resolution: Entity, status: OptionSetValue) -> Self {
        Self::new("CloseIncident")
            .with_parameter("IncidentResolution", incident_resolution)
            .with_parameter("Status", status)
    }

    /// `CancelSalesOrder` message.
    pub fn cancel_sales_order(order_close: Entity, status: OptionSetValue) -> Self {
        Self::new("CancelSalesOrder")
            .with_parameter("OrderClose", order_close)
            .with_parameter("Status", status)
    }

    /// Returns the message name.
    pub fn request_name(&self) -> &str {
        &self.request_name
    }

    /// Returns a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&RequestParameter> {
        self.parameters.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterates parameters in order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &RequestParameter)> {
        self.parameters.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the `Target` entity, if present.
    pub fn target(&self) -> Option<&Entity> {
        match self.parameter("Target") {
            Some(RequestParameter::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    /// Marks the request to bypass custom plugin execution.
    pub fn with_bypass_plugin_execution(self, bypass: bool) -> Self {
        if bypass {
            self.with_parameter(BYPASS_CUSTOM_PLUGIN_EXECUTION, true)
        } else {
            self
        }
    }

    /// Returns true if the bypass parameter is set.
    pub fn bypasses_plugin_execution(&self) -> bool {
        matches!(
            self.parameter(BYPASS_CUSTOM_PLUGIN_EXECUTION),
            Some(RequestParameter::Value(AttributeValue::Boolean(true)))
        )
    }

    /// Returns true if this message can be sent through the Web API path.
    ///
    /// Only `Create`, `Update` and `Delete` qualify; `Upsert` stays on the
    /// organization-service path because its Web API response cannot be
    /// mapped back yet.
    pub fn is_valid_for_web_api(&self) -> bool {
        matches!(
            self.request_name.to_lowercase().as_str(),
            "create" | "update" | "delete"
        )
    }
}
