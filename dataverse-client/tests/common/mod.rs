//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dataverse_core::{AttributeMetadata, EntityMetadata, OrganizationRequest, RelationshipInfo};
use dataverse_client::{
    ClientConfig, DataverseClient, DataverseError, Executor, MetadataCache, OrganizationResponse,
    Result,
};

pub const ACCOUNT_ID: &str = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
pub const CONTACT_ID: &str = "9a1c2b3d-0000-4e5f-8a9b-112233445566";

/// Metadata for `account` and `contact` with a polymorphic customer lookup
/// on `incident` and an ordinary parent lookup on `account`.
pub fn sample_metadata() -> MetadataCache {
    let cache = MetadataCache::new();
    cache.insert_entity(EntityMetadata::new("account", "accounts"));
    cache.insert_entity(EntityMetadata::new("contact", "contacts"));
    cache.insert_entity(EntityMetadata::new("systemuser", "systemusers"));
    cache.insert_entity(
        EntityMetadata::new("incident", "incidents")
            .with_relationship(RelationshipInfo::new(
                "customerid",
                "account",
                Some("customerid_account".to_string()),
            ))
            .with_relationship(RelationshipInfo::new(
                "customerid",
                "contact",
                Some("customerid_contact".to_string()),
            )),
    );
    cache.insert_attribute("account", AttributeMetadata::lookup("parentaccountid", ["account"]));
    cache.insert_attribute("account", AttributeMetadata::lookup("primarycontactid", ["contact"]));
    cache.insert_attribute("account", AttributeMetadata::other("name"));
    cache.insert_attribute(
        "incident",
        AttributeMetadata::lookup("customerid", ["account", "contact"]),
    );
    cache
}

/// An executor recording every request it receives.
#[derive(Default)]
pub struct RecordingExecutor {
    requests: Mutex<Vec<(OrganizationRequest, bool)>>,
    calls: AtomicUsize,
    fail_with: Mutex<Option<DataverseError>>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(error: DataverseError) -> Arc<Self> {
        let executor = Self::default();
        *executor.fail_with.lock().unwrap() = Some(error);
        Arc::new(executor)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(OrganizationRequest, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(
        &self,
        request: OrganizationRequest,
        bypass_plugin_execution: bool,
    ) -> Result<OrganizationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = request.request_name().to_string();
        self.requests
            .lock()
            .unwrap()
            .push((request, bypass_plugin_execution));
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }
        Ok(OrganizationResponse::new(name))
    }
}

pub fn online_config() -> ClientConfig {
    ClientConfig::builder()
        .service_uri("https://contoso.crm.dynamics.com")
        .build()
        .expect("failed to build config")
}

pub fn client_with(executor: Arc<RecordingExecutor>) -> DataverseClient {
    DataverseClient::new(online_config(), Arc::new(sample_metadata()), executor)
}
