//! Request execution seam and Web API request preparation.
//!
//! The transport is not part of this crate. Implement [`Executor`] to send
//! [`OrganizationRequest`]s; [`WebApiRequest::prepare`] builds the Web API
//! form of the requests that have one.

mod retry;

pub use retry::{should_auto_retry_retrieve, AUTO_RETRY_RETRIEVE_ENTITIES};

use async_trait::async_trait;
use dataverse_core::translate::encode_identity;
use dataverse_core::{
    AttributePayloadTranslator, AttributeValue, DataverseError, EntityFilters, MetadataProvider,
    OrganizationRequest, RequestParameter, Result, WebApiPayload,
};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Header carrying the plugin bypass flag on Web API requests.
pub const BYPASS_CUSTOM_PLUGIN_EXECUTION_HEADER: &str = "MSCRM.BypassCustomPluginExecution";

/// Response to an executed request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrganizationResponse {
    request_name: String,
    results: Map<String, Value>,
}

impl OrganizationResponse {
    /// Creates an empty response for `request_name`.
    pub fn new(request_name: impl Into<String>) -> Self {
        Self {
            request_name: request_name.into(),
            results: Map::new(),
        }
    }

    /// Adds a named result value.
    pub fn with_result(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.results.insert(name.into(), value.into());
        self
    }

    /// Returns the message name this response answers.
    pub fn request_name(&self) -> &str {
        &self.request_name
    }

    /// Returns a named result.
    pub fn result(&self, name: &str) -> Option<&Value> {
        self.results.get(name)
    }

    /// Returns all results.
    pub fn results(&self) -> &Map<String, Value> {
        &self.results
    }

    /// Returns the `id` result parsed as a guid, if present.
    pub fn id(&self) -> Option<Uuid> {
        self.results
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Sends requests to the service.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes `request` immediately.
    ///
    /// `bypass_plugin_execution` asks the server to skip custom plugins.
    async fn execute(
        &self,
        request: OrganizationRequest,
        bypass_plugin_execution: bool,
    ) -> Result<OrganizationResponse>;
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for std::sync::Arc<T> {
    async fn execute(
        &self,
        request: OrganizationRequest,
        bypass_plugin_execution: bool,
    ) -> Result<OrganizationResponse> {
        (**self).execute(request, bypass_plugin_execution).await
    }
}

/// HTTP method of a Web API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebApiMethod {
    /// Create a record.
    Post,
    /// Update a record.
    Patch,
    /// Delete a record.
    Delete,
}

impl WebApiMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebApiMethod::Post => "POST",
            WebApiMethod::Patch => "PATCH",
            WebApiMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for WebApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request in Web API form: method, entity-set relative path, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebApiRequest {
    method: WebApiMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<WebApiPayload>,
}

impl WebApiRequest {
    /// Builds the Web API form of `request`.
    ///
    /// Returns `Ok(None)` for messages with no Web API form (anything other
    /// than create, update and delete).
    ///
    /// # Errors
    ///
    /// - [`DataverseError::InvalidInput`] if the request has no usable target,
    ///   or an update target has no id.
    /// - Any translation error for the target's attributes.
    pub fn prepare<M: MetadataProvider>(
        request: &OrganizationRequest,
        translator: &AttributePayloadTranslator<M>,
    ) -> Result<Option<Self>> {
        if !request.is_valid_for_web_api() {
            return Ok(None);
        }

        let name = request.request_name().to_lowercase();
        let mut prepared = match (name.as_str(), request.parameter("Target")) {
            ("create", Some(RequestParameter::Entity(target))) => {
                let set = entity_set_name(translator.metadata(), target.logical_name())?;
                Self {
                    method: WebApiMethod::Post,
                    path: format!("/{set}"),
                    headers: Vec::new(),
                    body: Some(translator.translate(target.logical_name(), target.attributes())?),
                }
            }
            ("update", Some(RequestParameter::Entity(target))) => {
                if target.id().is_nil() {
                    return Err(DataverseError::InvalidInput(format!(
                        "update target {} has no id",
                        target.logical_name()
                    )));
                }
                let set = entity_set_name(translator.metadata(), target.logical_name())?;
                Self {
                    method: WebApiMethod::Patch,
                    path: format!("/{set}({})", target.id().hyphenated()),
                    headers: Vec::new(),
                    body: Some(translator.translate(target.logical_name(), target.attributes())?),
                }
            }
            ("delete", Some(RequestParameter::Value(AttributeValue::EntityReference(target)))) => {
                let set = entity_set_name(translator.metadata(), target.logical_name())?;
                Self {
                    method: WebApiMethod::Delete,
                    path: format!("/{set}({})", encode_identity(target)?),
                    headers: Vec::new(),
                    body: None,
                }
            }
            _ => {
                return Err(DataverseError::InvalidInput(format!(
                    "{} request has no usable Target",
                    request.request_name()
                )))
            }
        };

        if request.bypasses_plugin_execution() {
            prepared
                .headers
                .push((BYPASS_CUSTOM_PLUGIN_EXECUTION_HEADER.to_string(), "true".to_string()));
        }
        Ok(Some(prepared))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> WebApiMethod {
        self.method
    }

    /// Returns the path relative to the Web API root, e.g. `/accounts(<id>)`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns extra request headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the JSON body, if any.
    pub fn body(&self) -> Option<&WebApiPayload> {
        self.body.as_ref()
    }
}

fn entity_set_name<M: MetadataProvider>(metadata: &M, entity_name: &str) -> Result<String> {
    metadata
        .entity_metadata(EntityFilters::Entity, entity_name)?
        .map(|m| m.entity_set_name().to_string())
        .filter(|set| !set.is_empty())
        .ok_or_else(|| DataverseError::EntityMetadataNotFound(entity_name.to_string()))
}
