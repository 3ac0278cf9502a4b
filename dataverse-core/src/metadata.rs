//! Metadata contracts consumed by the payload translator.
//!
//! Metadata is owned by an external lookup service; this crate only reads it
//! through [`MetadataProvider`].

use crate::error::Result;

/// Which parts of entity metadata a lookup must populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFilters {
    /// Entity-level properties such as the entity set name.
    Entity,
    /// Relationship lists.
    Relationships,
    /// Everything.
    All,
}

/// Attribute type classification relevant to payload translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    /// A lookup to one or more target entity types.
    Lookup {
        /// Logical names of the entities the lookup may point at.
        targets: Vec<String>,
    },
    /// Any non-lookup attribute.
    Other,
}

/// Metadata describing a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMetadata {
    logical_name: String,
    kind: AttributeKind,
}

impl AttributeMetadata {
    /// Creates lookup metadata with the given target entities.
    pub fn lookup<I, S>(logical_name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logical_name: logical_name.into(),
            kind: AttributeKind::Lookup {
                targets: targets.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Creates metadata for a non-lookup attribute.
    pub fn other(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            kind: AttributeKind::Other,
        }
    }

    /// Returns the attribute logical name.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Returns the attribute kind.
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// Returns true for lookup attributes.
    pub fn is_lookup(&self) -> bool {
        matches!(self.kind, AttributeKind::Lookup { .. })
    }

    /// Returns true for lookups that may target more than one entity type
    /// (customer, owner, regarding).
    pub fn is_polymorphic_lookup(&self) -> bool {
        matches!(&self.kind, AttributeKind::Lookup { targets } if targets.len() > 1)
    }
}

/// A many-to-one relationship from the owning entity to another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipInfo {
    referencing_attribute: String,
    referenced_entity: String,
    navigation_property_name: Option<String>,
}

impl RelationshipInfo {
    /// Creates a relationship entry.
    pub fn new(
        referencing_attribute: impl Into<String>,
        referenced_entity: impl Into<String>,
        navigation_property_name: Option<String>,
    ) -> Self {
        Self {
            referencing_attribute: referencing_attribute.into(),
            referenced_entity: referenced_entity.into(),
            navigation_property_name,
        }
    }

    /// Returns the attribute on the owning entity.
    pub fn referencing_attribute(&self) -> &str {
        &self.referencing_attribute
    }

    /// Returns the entity the relationship points at.
    pub fn referenced_entity(&self) -> &str {
        &self.referenced_entity
    }

    /// Returns the navigation property used to bind this relationship, if any.
    pub fn navigation_property_name(&self) -> Option<&str> {
        self.navigation_property_name.as_deref().filter(|s| !s.is_empty())
    }
}

/// Entity-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityMetadata {
    logical_name: String,
    entity_set_name: String,
    many_to_one_relationships: Vec<RelationshipInfo>,
}

impl EntityMetadata {
    /// Creates entity metadata with no relationships.
    pub fn new(logical_name: impl Into<String>, entity_set_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            entity_set_name: entity_set_name.into(),
            many_to_one_relationships: Vec::new(),
        }
    }

    /// Adds a many-to-one relationship.
    pub fn with_relationship(mut self, relationship: RelationshipInfo) -> Self {
        self.many_to_one_relationships.push(relationship);
        self
    }

    /// Returns the entity logical name.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Returns the Web API collection (entity set) name.
    pub fn entity_set_name(&self) -> &str {
        &self.entity_set_name
    }

    /// Returns the many-to-one relationships.
    pub fn many_to_one_relationships(&self) -> &[RelationshipInfo] {
        &self.many_to_one_relationships
    }

    /// Finds the relationship binding `attribute` to `referenced_entity`.
    pub fn find_many_to_one(&self, attribute: &str, referenced_entity: &str) -> Option<&RelationshipInfo> {
        self.many_to_one_relationships.iter().find(|r| {
            r.referencing_attribute == attribute && r.referenced_entity == referenced_entity
        })
    }
}

/// Source of attribute and entity metadata.
///
/// Implementations may be backed by a remote service; errors are passed
/// through to the caller unchanged and never retried here.
pub trait MetadataProvider: Send + Sync {
    /// Looks up an attribute by entity and lower-cased attribute name.
    fn attribute_metadata(
        &self,
        entity_name: &str,
        attribute_name: &str,
    ) -> Result<Option<AttributeMetadata>>;

    /// Looks up entity metadata, populating at least the parts named by `filters`.
    fn entity_metadata(
        &self,
        filters: EntityFilters,
        entity_name: &str,
    ) -> Result<Option<EntityMetadata>>;
}

impl<T: MetadataProvider + ?Sized> MetadataProvider for &T {
    fn attribute_metadata(
        &self,
        entity_name: &str,
        attribute_name: &str,
    ) -> Result<Option<AttributeMetadata>> {
        (**self).attribute_metadata(entity_name, attribute_name)
    }

    fn entity_metadata(
        &self,
        filters: EntityFilters,
        entity_name: &str,
    ) -> Result<Option<EntityMetadata>> {
        (**self).entity_metadata(filters, entity_name)
    }
}

impl<T: MetadataProvider + ?Sized> MetadataProvider for std::sync::Arc<T> {
    fn attribute_metadata(
        &self,
        entity_name: &str,
        attribute_name: &str,
    ) -> Result<Option<AttributeMetadata>> {
        (**self).attribute_metadata(entity_name, attribute_name)
    }

    fn entity_metadata(
        &self,
        filters: EntityFilters,
        entity_name: &str,
    ) -> Result<Option<EntityMetadata>> {
        (**self).entity_metadata(filters, entity_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polymorphic_classification() {
        let owner = AttributeMetadata::lookup("ownerid", ["systemuser", "team"]);
        let parent = AttributeMetadata::lookup("parentaccountid", ["account"]);
        let name = AttributeMetadata::other("name");

        assert!(owner.is_polymorphic_lookup());
        assert!(parent.is_lookup());
        assert!(!parent.is_polymorphic_lookup());
        assert!(!name.is_lookup());
        assert!(!name.is_polymorphic_lookup());
    }

    #[test]
    fn test_find_many_to_one() {
        let metadata = EntityMetadata::new("account", "accounts")
            .with_relationship(RelationshipInfo::new(
                "ownerid",
                "systemuser",
                Some("ownerid_systemuser".to_string()),
            ))
            .with_relationship(RelationshipInfo::new(
                "ownerid",
                "team",
                Some("ownerid_team".to_string()),
            ));

        let rel = metadata.find_many_to_one("ownerid", "team").unwrap();
        assert_eq!(rel.navigation_property_name(), Some("ownerid_team"));
        assert!(metadata.find_many_to_one("ownerid", "contact").is_none());
    }

    #[test]
    fn test_empty_navigation_name_is_none() {
        let rel = RelationshipInfo::new("regardingobjectid", "account", Some(String::new()));
        assert_eq!(rel.navigation_property_name(), None);
    }
}
