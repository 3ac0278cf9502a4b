//! Payload translation through the client with a metadata cache.

mod common;

use std::sync::Arc;

use common::{sample_metadata, ACCOUNT_ID, CONTACT_ID};
use dataverse_client::{DataverseError, MetadataCache};
use dataverse_core::{
    AttributeCollection, AttributePayloadTranslator, AttributeValue, EntityReference,
    OptionSetValue,
};
use uuid::Uuid;

fn account_id() -> Uuid {
    Uuid::parse_str(ACCOUNT_ID).unwrap()
}

#[test]
fn test_polymorphic_customer_uses_navigation_property() {
    let translator = AttributePayloadTranslator::new(sample_metadata());
    let attributes = AttributeCollection::new()
        .with("title", "Printer jam")
        .with("customerid", EntityReference::new("contact", Uuid::parse_str(CONTACT_ID).unwrap()));

    let payload = translator.translate("incident", &attributes).unwrap();
    assert_eq!(payload.len(), 2);
    assert_eq!(
        payload.get("customerid_contact@odata.bind"),
        Some(Some(format!("/contacts({CONTACT_ID})").as_str()))
    );
}

#[test]
fn test_ordinary_lookup_keeps_attribute_key() {
    let translator = AttributePayloadTranslator::new(sample_metadata());
    let attributes =
        AttributeCollection::new().with("parentaccountid", EntityReference::new("account", account_id()));

    let payload = translator.translate("account", &attributes).unwrap();
    assert_eq!(
        payload.iter().collect::<Vec<_>>(),
        vec![(
            "parentaccountid@odata.bind",
            Some(format!("/accounts({ACCOUNT_ID})").as_str())
        )]
    );
}

#[test]
fn test_alternate_key_lookup() {
    let translator = AttributePayloadTranslator::new(sample_metadata());
    let reference = EntityReference::with_keys(
        "account",
        [("accountnumber", AttributeValue::from("12345"))].into_iter().collect(),
    );
    let attributes = AttributeCollection::new().with("parentaccountid", reference);

    let payload = translator.translate("account", &attributes).unwrap();
    assert_eq!(
        payload.get("parentaccountid@odata.bind"),
        Some(Some("/accounts(accountnumber='12345')"))
    );
}

#[test]
fn test_translation_is_idempotent_and_ordered() {
    let translator = AttributePayloadTranslator::new(sample_metadata());
    let attributes = AttributeCollection::new()
        .with("Name", "Contoso")
        .with("industrycode", OptionSetValue::new(7))
        .with("name", "Contoso again")
        .with("parentaccountid", EntityReference::new("account", account_id()))
        .with("description", AttributeValue::Null);

    let first = translator.translate("account", &attributes).unwrap();
    let second = translator.translate("account", &attributes).unwrap();
    assert_eq!(first.to_json_string().unwrap(), second.to_json_string().unwrap());

    let keys: Vec<_> = first.iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec!["name", "industrycode", "name", "parentaccountid@odata.bind", "description"]
    );
    assert_eq!(first.get("description"), Some(None));
}

#[test]
fn test_missing_lookup_metadata_fails_closed() {
    let translator = AttributePayloadTranslator::new(MetadataCache::new());
    let attributes = AttributeCollection::new()
        .with("name", "Contoso")
        .with("ownerid", EntityReference::new("systemuser", Uuid::new_v4()));

    let err = translator.translate("account", &attributes).unwrap_err();
    assert!(matches!(
        err,
        DataverseError::UnresolvedLookupMetadata { ref attribute, ref entity }
            if attribute == "ownerid" && entity == "account"
    ));
}

#[test]
fn test_client_translate_reads_through_cache() {
    let cache = Arc::new(MetadataCache::with_source(Arc::new(sample_metadata())));
    let client = dataverse_client::DataverseClient::new(
        common::online_config(),
        cache.clone(),
        common::RecordingExecutor::new(),
    );
    let attributes =
        AttributeCollection::new().with("primarycontactid", EntityReference::new("contact", Uuid::new_v4()));

    client.translate("account", &attributes).unwrap();
    client.translate("account", &attributes).unwrap();
    let stats = cache.stats();
    assert!(stats.hits() > 0);
    assert_eq!(cache.entity_count(), 1);
}
