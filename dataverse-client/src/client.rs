//! Dataverse client entry point.

use std::sync::Arc;

use dataverse_core::{
    AttributeCollection, AttributePayloadTranslator, AttributeValue, DataverseError,
    MetadataProvider, OrganizationRequest, RequestParameter, Result, WebApiPayload,
};
use uuid::Uuid;

use crate::batch::{BatchRouter, InMemoryBatchStore, RequestBatch};
use crate::config::ClientConfig;
use crate::connection::{EndpointResolver, ResolvedEndpoint};
use crate::executor::{should_auto_retry_retrieve, Executor, OrganizationResponse, WebApiRequest};

/// Client tying together endpoint resolution, payload translation, batching
/// and an [`Executor`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use dataverse_client::{ClientConfig, DataverseClient, MetadataCache};
///
/// let config = ClientConfig::builder()
///     .service_uri("https://contoso.crm4.dynamics.com")
///     .build()?;
/// let client = DataverseClient::new(config, Arc::new(MetadataCache::new()), Arc::new(my_executor));
///
/// let batch = client.create_batch("import", true, true);
/// client.execute_or_queue(batch, request, false).await?;
/// let responses = client.execute_batch(batch).await?;
/// ```
pub struct DataverseClient {
    config: Arc<ClientConfig>,
    endpoint: ResolvedEndpoint,
    resolver: EndpointResolver,
    translator: AttributePayloadTranslator<Arc<dyn MetadataProvider>>,
    executor: Arc<dyn Executor>,
    batches: Arc<InMemoryBatchStore>,
    router: BatchRouter<Arc<InMemoryBatchStore>>,
}

impl DataverseClient {
    /// Creates a client and resolves the configured service URI.
    pub fn new(
        config: ClientConfig,
        metadata: Arc<dyn MetadataProvider>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let resolver = EndpointResolver::new(config.registry().clone())
            .with_policy(config.host_policy());
        let endpoint = resolver.resolve(config.service_uri(), config.geo());

        if endpoint.is_region_ambiguous() {
            tracing::warn!(
                uri = %config.service_uri(),
                "no discovery region matched the service URI, falling back to global discovery"
            );
        }
        tracing::info!(
            organization = %endpoint.organization_name(),
            on_premise = endpoint.is_on_premise(),
            region = endpoint.region().map(|r| r.short_name()).unwrap_or("global"),
            "dataverse client ready"
        );

        let batches = Arc::new(InMemoryBatchStore::with_limit(config.max_requests_per_batch()));
        Self {
            config: Arc::new(config),
            endpoint,
            resolver,
            translator: AttributePayloadTranslator::new(metadata),
            executor,
            router: BatchRouter::new(Arc::clone(&batches)),
            batches,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the resolved endpoint of the configured service URI.
    pub fn endpoint(&self) -> &ResolvedEndpoint {
        &self.endpoint
    }

    /// Returns the endpoint resolver.
    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Returns the payload translator.
    pub fn translator(&self) -> &AttributePayloadTranslator<Arc<dyn MetadataProvider>> {
        &self.translator
    }

    /// Returns the batch store.
    pub fn batches(&self) -> &InMemoryBatchStore {
        &self.batches
    }

    /// Translates `attributes` of `entity_name` into a Web API payload.
    pub fn translate(&self, entity_name: &str, attributes: &AttributeCollection) -> Result<WebApiPayload> {
        self.translator.translate(entity_name, attributes)
    }

    /// Builds the Web API form of `request`, if it has one.
    pub fn prepare_web_api_request(&self, request: &OrganizationRequest) -> Result<Option<WebApiRequest>> {
        WebApiRequest::prepare(request, &self.translator)
    }

    /// Registers a new batch and returns its id.
    pub fn create_batch(&self, name: impl Into<String>, return_results: bool, continue_on_error: bool) -> Uuid {
        self.batches.create_batch(name, return_results, continue_on_error)
    }

    /// Queues `request` into `batch_id` when it is not nil.
    ///
    /// Returns `true` if queued.
    pub fn route(&self, batch_id: Uuid, request: OrganizationRequest, bypass_plugin_execution: bool) -> bool {
        self.router.route(batch_id, request, bypass_plugin_execution)
    }

    /// Executes `request` now.
    ///
    /// Retrieve requests whose query targets an auto-retry entity are retried
    /// on connection failures, up to the configured retry count.
    pub async fn execute(
        &self,
        request: OrganizationRequest,
        bypass_plugin_execution: bool,
    ) -> Result<OrganizationResponse> {
        let retries = if is_auto_retry_retrieve(&request) {
            self.config.retry().max_retries()
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            match self.executor.execute(request.clone(), bypass_plugin_execution).await {
                Err(DataverseError::Connection(message)) if attempt < retries => {
                    attempt += 1;
                    tracing::warn!(
                        request = %request.request_name(),
                        attempt,
                        error = %message,
                        "retrying retrieve after connection failure"
                    );
                    tokio::time::sleep(self.config.retry().retry_pause()).await;
                }
                result => return result,
            }
        }
    }

    /// Queues `request` into `batch_id`, or executes it now when `batch_id` is nil.
    ///
    /// Returns `Ok(None)` when queued.
    pub async fn execute_or_queue(
        &self,
        batch_id: Uuid,
        request: OrganizationRequest,
        bypass_plugin_execution: bool,
    ) -> Result<Option<OrganizationResponse>> {
        if self.router.route(batch_id, request.clone(), bypass_plugin_execution) {
            return Ok(None);
        }
        self.execute(request, bypass_plugin_execution).await.map(Some)
    }

    /// Takes the batch out of the store and executes its requests in order.
    ///
    /// Per-request outcomes are returned in append order. Unless the batch
    /// continues on error, execution stops after the first failure. When the
    /// batch does not return results, successful responses are replaced by
    /// empty ones.
    ///
    /// # Errors
    ///
    /// Fails before executing anything if the batch id is unknown or the
    /// batch exceeds the request limit.
    pub async fn execute_batch(&self, batch_id: Uuid) -> Result<Vec<Result<OrganizationResponse>>> {
        let batch = self.batches.take_batch(batch_id)?;
        tracing::debug!(batch_id = %batch_id, requests = batch.len(), "executing batch");
        Ok(self.run_batch(batch).await)
    }

    async fn run_batch(&self, batch: RequestBatch) -> Vec<Result<OrganizationResponse>> {
        let return_results = batch.return_results();
        let continue_on_error = batch.continue_on_error();
        let mut outcomes = Vec::with_capacity(batch.len());

        for queued in batch.into_requests() {
            let bypass = queued.bypass_plugin_execution();
            let request = queued.request().clone();
            let name = request.request_name().to_string();
            let outcome = self.executor.execute(request, bypass).await;
            let failed = outcome.is_err();
            outcomes.push(match outcome {
                Ok(_) if !return_results => Ok(OrganizationResponse::new(name)),
                other => other,
            });
            if failed && !continue_on_error {
                break;
            }
        }
        outcomes
    }
}

impl std::fmt::Debug for DataverseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataverseClient")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn is_auto_retry_retrieve(request: &OrganizationRequest) -> bool {
    if !request.request_name().eq_ignore_ascii_case("RetrieveMultiple") {
        return false;
    }
    matches!(
        request.parameter("Query"),
        Some(RequestParameter::Value(AttributeValue::String(query))) if should_auto_retry_retrieve(query)
    )
}
