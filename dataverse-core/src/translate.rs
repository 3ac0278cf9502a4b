//! Attribute collection to Web API payload translation.
//!
//! Lookup attributes are rewritten into `@odata.bind` members whose value is
//! the API-relative path of the target record. Polymorphic lookups consult
//! the owning entity's many-to-one relationships to pick the navigation
//! property that matches the reference's target entity type. All other
//! values are encoded by [`encode_value`] under their lower-cased key.

use crate::encoding::{encode_alt_keys, encode_value};
use crate::error::{DataverseError, Result};
use crate::metadata::{AttributeMetadata, EntityFilters, MetadataProvider};
use crate::payload::{SerializedField, WebApiPayload, ODATA_BIND_SUFFIX};
use crate::value::{AttributeCollection, AttributeValue, EntityReference};

/// Translates attribute collections into Web API payloads.
///
/// The translator holds no per-call state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct AttributePayloadTranslator<M> {
    metadata: M,
}

impl<M: MetadataProvider> AttributePayloadTranslator<M> {
    /// Creates a translator reading metadata from `metadata`.
    pub fn new(metadata: M) -> Self {
        Self { metadata }
    }

    /// Returns the metadata provider.
    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Translates `attributes` of `entity_name` into an ordered payload.
    ///
    /// One field is produced per input attribute, in input order. Any failure
    /// aborts the whole translation.
    ///
    /// # Errors
    ///
    /// - [`DataverseError::UnresolvedLookupMetadata`] if a lookup attribute has
    ///   no metadata on `entity_name`.
    /// - [`DataverseError::EntityMetadataNotFound`] if the referenced entity (or
    ///   the owning entity of a polymorphic lookup) has no metadata.
    /// - [`DataverseError::InvalidInput`] for a reference with a nil id and no
    ///   alternate keys.
    pub fn translate(&self, entity_name: &str, attributes: &AttributeCollection) -> Result<WebApiPayload> {
        let mut payload = WebApiPayload::with_capacity(attributes.len());
        for (key, value) in attributes.iter() {
            let field = match value {
                AttributeValue::EntityReference(reference) => {
                    self.translate_lookup(entity_name, key, reference)?
                }
                other => SerializedField::new(key.to_lowercase(), encode_value(other))?,
            };
            payload.push(field);
        }
        Ok(payload)
    }

    fn translate_lookup(
        &self,
        entity_name: &str,
        key: &str,
        reference: &EntityReference,
    ) -> Result<SerializedField> {
        let attribute_name = key.to_lowercase();
        let attribute = self
            .metadata
            .attribute_metadata(entity_name, &attribute_name)?
            .ok_or_else(|| DataverseError::UnresolvedLookupMetadata {
                attribute: attribute_name.clone(),
                entity: entity_name.to_string(),
            })?;

        let output_key = self.lookup_key(entity_name, key, &attribute, reference)?;
        let identity = encode_identity(reference)?;
        let collection = self.entity_set_name(reference.logical_name())?;

        SerializedField::new(output_key, Some(format!("/{collection}({identity})")))
    }

    fn lookup_key(
        &self,
        entity_name: &str,
        key: &str,
        attribute: &AttributeMetadata,
        reference: &EntityReference,
    ) -> Result<String> {
        // Metadata exists but is not a lookup: the key passes through untouched.
        if !attribute.is_lookup() {
            return Ok(key.to_string());
        }

        let mut bound_key = key.to_string();
        if attribute.is_polymorphic_lookup() {
            let owner = self
                .metadata
                .entity_metadata(EntityFilters::Relationships, entity_name)?
                .ok_or_else(|| DataverseError::EntityMetadataNotFound(entity_name.to_string()))?;
            if let Some(navigation) = owner
                .find_many_to_one(attribute.logical_name(), reference.logical_name())
                .and_then(|r| r.navigation_property_name())
            {
                bound_key = navigation.to_string();
            }
        }
        Ok(format!("{bound_key}{ODATA_BIND_SUFFIX}"))
    }

    fn entity_set_name(&self, entity_name: &str) -> Result<String> {
        let metadata = self
            .metadata
            .entity_metadata(EntityFilters::Entity, entity_name)?
            .ok_or_else(|| DataverseError::EntityMetadataNotFound(entity_name.to_string()))?;
        if metadata.entity_set_name().is_empty() {
            return Err(DataverseError::EntityMetadataNotFound(entity_name.to_string()));
        }
        Ok(metadata.entity_set_name().to_string())
    }
}

/// Encodes the identity segment of a reference: alternate keys when present,
/// otherwise the hyphenated primary id.
pub fn encode_identity(reference: &EntityReference) -> Result<String> {
    if !reference.key_attributes().is_empty() {
        return Ok(encode_alt_keys(reference.key_attributes()));
    }
    if reference.id().is_nil() {
        return Err(DataverseError::InvalidInput(format!(
            "reference to {} has neither an id nor alternate keys",
            reference.logical_name()
        )));
    }
    Ok(reference.id().hyphenated().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, RelationshipInfo};
    use crate::value::{KeyAttributeCollection, Money, OptionSetValue};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct StubMetadata {
        attributes: HashMap<(String, String), AttributeMetadata>,
        entities: HashMap<String, EntityMetadata>,
        relationship_lookups: AtomicUsize,
    }

    impl StubMetadata {
        fn with_attribute(mut self, entity: &str, attribute: AttributeMetadata) -> Self {
            self.attributes
                .insert((entity.to_string(), attribute.logical_name().to_string()), attribute);
            self
        }

        fn with_entity(mut self, entity: EntityMetadata) -> Self {
            self.entities.insert(entity.logical_name().to_string(), entity);
            self
        }
    }

    impl MetadataProvider for StubMetadata {
        fn attribute_metadata(&self, entity: &str, attribute: &str) -> Result<Option<AttributeMetadata>> {
            Ok(self.attributes.get(&(entity.to_string(), attribute.to_string())).cloned())
        }

        fn entity_metadata(&self, filters: EntityFilters, entity: &str) -> Result<Option<EntityMetadata>> {
            if filters == EntityFilters::Relationships {
                self.relationship_lookups.fetch_add(1, Ordering::SeqCst);
            }
            Ok(self.entities.get(entity).cloned())
        }
    }

    fn one_key(key: &str, value: &str) -> KeyAttributeCollection {
        [(key, AttributeValue::from(value))].into_iter().collect()
    }

    fn account_metadata() -> StubMetadata {
        StubMetadata::default()
            .with_attribute("account", AttributeMetadata::lookup("ownerid", ["systemuser", "team"]))
            .with_attribute("account", AttributeMetadata::lookup("parentaccountid", ["account"]))
            .with_attribute("account", AttributeMetadata::other("name"))
            .with_entity(
                EntityMetadata::new("account", "accounts")
                    .with_relationship(RelationshipInfo::new(
                        "ownerid",
                        "systemuser",
                        Some("ownerid_systemuser".to_string()),
                    ))
                    .with_relationship(RelationshipInfo::new("ownerid", "team", None)),
            )
            .with_entity(EntityMetadata::new("systemuser", "systemusers"))
            .with_entity(EntityMetadata::new("team", "teams"))
    }

    #[test]
    fn test_polymorphic_lookup_uses_navigation_property() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let id = Uuid::new_v4();
        let attrs = AttributeCollection::new().with("ownerid", EntityReference::new("systemuser", id));

        let payload = translator.translate("account", &attrs).unwrap();

        assert_eq!(payload.len(), 1);
        let field = &payload.fields()[0];
        assert_eq!(field.key(), "ownerid_systemuser@odata.bind");
        assert_eq!(field.value(), Some(format!("/systemusers({id})").as_str()));
    }

    #[test]
    fn test_polymorphic_lookup_without_navigation_keeps_key() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let id = Uuid::new_v4();
        let attrs = AttributeCollection::new().with("OwnerId", EntityReference::new("team", id));

        let payload = translator.translate("account", &attrs).unwrap();

        assert_eq!(payload.fields()[0].key(), "OwnerId@odata.bind");
        assert_eq!(payload.fields()[0].value(), Some(format!("/teams({id})").as_str()));
    }

    #[test]
    fn test_ordinary_lookup_skips_relationship_fetch() {
        let metadata = account_metadata();
        let translator = AttributePayloadTranslator::new(&metadata);
        let id = Uuid::new_v4();
        let attrs = AttributeCollection::new().with("parentaccountid", EntityReference::new("account", id));

        let payload = translator.translate("account", &attrs).unwrap();

        assert_eq!(payload.fields()[0].key(), "parentaccountid@odata.bind");
        assert_eq!(payload.fields()[0].value(), Some(format!("/accounts({id})").as_str()));
        assert_eq!(metadata.relationship_lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lookup_with_alternate_keys() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let reference = EntityReference::with_keys("account", one_key("accountnumber", "12345"));
        let attrs = AttributeCollection::new().with("parentaccountid", reference);

        let payload = translator.translate("account", &attrs).unwrap();

        assert_eq!(payload.fields()[0].value(), Some("/accounts(accountnumber='12345')"));
    }

    #[test]
    fn test_alternate_keys_take_precedence_over_id() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let reference = EntityReference::new("account", Uuid::new_v4()).with_key("accountnumber", "A-1");
        let attrs = AttributeCollection::new().with("parentaccountid", reference);

        let payload = translator.translate("account", &attrs).unwrap();

        assert_eq!(payload.fields()[0].value(), Some("/accounts(accountnumber='A-1')"));
    }

    #[test]
    fn test_missing_lookup_metadata_fails_closed() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let attrs = AttributeCollection::new()
            .with("name", "Contoso")
            .with("PrimaryContactId", EntityReference::new("contact", Uuid::new_v4()));

        let err = translator.translate("account", &attrs).unwrap_err();

        match err {
            DataverseError::UnresolvedLookupMetadata { attribute, entity } => {
                assert_eq!(attribute, "primarycontactid");
                assert_eq!(entity, "account");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nil_reference_without_keys_is_rejected() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let attrs = AttributeCollection::new().with("parentaccountid", EntityReference::new("account", Uuid::nil()));

        let err = translator.translate("account", &attrs).unwrap_err();
        assert!(matches!(err, DataverseError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_target_entity_set() {
        let metadata = StubMetadata::default()
            .with_attribute("account", AttributeMetadata::lookup("parentaccountid", ["account"]));
        let translator = AttributePayloadTranslator::new(metadata);
        let attrs = AttributeCollection::new().with("parentaccountid", EntityReference::new("account", Uuid::new_v4()));

        let err = translator.translate("account", &attrs).unwrap_err();
        assert!(matches!(err, DataverseError::EntityMetadataNotFound(name) if name == "account"));
    }

    #[test]
    fn test_non_lookup_metadata_keeps_key_without_bind() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let id = Uuid::new_v4();
        let attrs = AttributeCollection::new().with("Name", EntityReference::new("account", id));

        let payload = translator.translate("account", &attrs).unwrap();
        assert_eq!(payload.fields()[0].key(), "Name");
        assert_eq!(payload.fields()[0].value(), Some(format!("/accounts({id})").as_str()));
    }

    #[test]
    fn test_scalar_values_encoded() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let id = Uuid::parse_str("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap();
        let attrs = AttributeCollection::new()
            .with("Name", "Contoso")
            .with("StatusCode", OptionSetValue::new(2))
            .with("Categories", vec![OptionSetValue::new(1), OptionSetValue::new(4)])
            .with("OverriddenCreatedOn", created)
            .with("Revenue", Money::new(Decimal::new(100050, 2)))
            .with("DoNotEmail", true)
            .with("ProcessId", id)
            .with("Description", AttributeValue::Null);

        let payload = translator.translate("account", &attrs).unwrap();
        let pairs: Vec<(&str, Option<&str>)> = payload.iter().collect();

        assert_eq!(
            pairs,
            vec![
                ("name", Some("Contoso")),
                ("statuscode", Some("2")),
                ("categories", Some("1,4")),
                ("overriddencreatedon", Some("2024-01-02T03:04:05.000Z")),
                ("revenue", Some("1000.50")),
                ("donotemail", Some("true")),
                ("processid", Some("0f8fad5b-d9cb-469f-a165-70867728950e")),
                ("description", None),
            ]
        );
    }

    #[test]
    fn test_empty_option_set_collection_is_null() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let attrs = AttributeCollection::new().with("categories", Vec::<OptionSetValue>::new());

        let payload = translator.translate("account", &attrs).unwrap();
        assert_eq!(payload.get("categories"), Some(None));
    }

    #[test]
    fn test_order_preserved_without_dedup() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let attrs = AttributeCollection::new()
            .with("b", 1)
            .with("a", 2)
            .with("b", 3);

        let payload = translator.translate("account", &attrs).unwrap();
        let keys: Vec<&str> = payload.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_translation_is_idempotent() {
        let translator = AttributePayloadTranslator::new(account_metadata());
        let attrs = AttributeCollection::new()
            .with("ownerid", EntityReference::new("systemuser", Uuid::new_v4()))
            .with("name", "Contoso");

        let first = translator.translate("account", &attrs).unwrap();
        let second = translator.translate("account", &attrs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json_string().unwrap(), second.to_json_string().unwrap());
    }
}
