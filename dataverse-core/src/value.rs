//! Typed attribute values and the ordered collections that carry them.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A single option-set (choice) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionSetValue(i32);

impl OptionSetValue {
    /// Creates an option-set value.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the numeric option value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for OptionSetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A currency amount. Precision and currency are applied server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money value.
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the decimal magnitude.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// A reference to another record, addressed either by id or by alternate key.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReference {
    logical_name: String,
    id: Uuid,
    key_attributes: KeyAttributeCollection,
}

impl EntityReference {
    /// Creates a reference addressed by primary id.
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
            key_attributes: KeyAttributeCollection::new(),
        }
    }

    /// Creates a reference addressed by alternate key.
    pub fn with_keys(logical_name: impl Into<String>, keys: KeyAttributeCollection) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: Uuid::nil(),
            key_attributes: keys,
        }
    }

    /// Adds an alternate key part to this reference.
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.key_attributes.insert(key, value);
        self
    }

    /// Returns the logical name of the referenced entity.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Returns the primary id, which may be nil when keys are used.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the alternate key attributes.
    pub fn key_attributes(&self) -> &KeyAttributeCollection {
        &self.key_attributes
    }
}

/// A value held by a named attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Text.
    String(String),
    /// 32-bit whole number.
    Integer(i32),
    /// 64-bit whole number.
    BigInt(i64),
    /// Floating point number.
    Double(f64),
    /// Decimal number.
    Decimal(Decimal),
    /// Two-option value.
    Boolean(bool),
    /// Point in time; normalized to UTC on the wire.
    DateTime(DateTime<FixedOffset>),
    /// Currency amount.
    Money(Money),
    /// Unique identifier.
    Guid(Uuid),
    /// Lookup to another record.
    EntityReference(EntityReference),
    /// Single choice.
    OptionSet(OptionSetValue),
    /// Multi-select choice.
    OptionSetCollection(Vec<OptionSetValue>),
    /// Alternate key attribute set.
    KeyAttributes(KeyAttributeCollection),
    /// Explicit null.
    Null,
}

impl AttributeValue {
    /// Returns true if this is an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Returns the entity reference, if this value is one.
    pub fn as_entity_reference(&self) -> Option<&EntityReference> {
        match self {
            AttributeValue::EntityReference(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the guid, if this value is one.
    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            AttributeValue::Guid(g) => Some(*g),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::BigInt(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<Decimal> for AttributeValue {
    fn from(v: Decimal) -> Self {
        AttributeValue::Decimal(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<DateTime<FixedOffset>> for AttributeValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        AttributeValue::DateTime(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(v.fixed_offset())
    }
}

impl From<Money> for AttributeValue {
    fn from(v: Money) -> Self {
        AttributeValue::Money(v)
    }
}

impl From<Uuid> for AttributeValue {
    fn from(v: Uuid) -> Self {
        AttributeValue::Guid(v)
    }
}

impl From<EntityReference> for AttributeValue {
    fn from(v: EntityReference) -> Self {
        AttributeValue::EntityReference(v)
    }
}

impl From<OptionSetValue> for AttributeValue {
    fn from(v: OptionSetValue) -> Self {
        AttributeValue::OptionSet(v)
    }
}

impl From<Vec<OptionSetValue>> for AttributeValue {
    fn from(v: Vec<OptionSetValue>) -> Self {
        AttributeValue::OptionSetCollection(v)
    }
}

impl From<KeyAttributeCollection> for AttributeValue {
    fn from(v: KeyAttributeCollection) -> Self {
        AttributeValue::KeyAttributes(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// Ordered attribute collection of a record or request.
///
/// Insertion order is kept and duplicate keys are allowed; consumers emit
/// one output per entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeCollection {
    entries: Vec<(String, AttributeValue)>,
}

impl AttributeCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Appends an attribute, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns true if any entry uses `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> Extend<(K, V)> for AttributeCollection {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.push(k, v);
        }
    }
}

impl IntoIterator for AttributeCollection {
    type Item = (String, AttributeValue);
    type IntoIter = std::vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Ordered set of alternate key parts. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyAttributeCollection {
    entries: Vec<(String, AttributeValue)>,
}

impl KeyAttributeCollection {
    /// Creates an empty key collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key part, replacing an existing part with the same name in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value of a key part.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the number of key parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no key parts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates key parts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for KeyAttributeCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut keys = Self::new();
        for (k, v) in iter {
            keys.insert(k, v);
        }
        keys
    }
}

/// A record: logical name, primary id and attribute state.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    logical_name: String,
    id: Uuid,
    attributes: AttributeCollection,
}

impl Entity {
    /// Creates an entity with a nil id and no attributes.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: Uuid::nil(),
            attributes: AttributeCollection::new(),
        }
    }

    /// Sets the primary id.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Replaces the attribute collection.
    pub fn with_attributes(mut self, attributes: AttributeCollection) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns the entity logical name.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Returns the primary id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the attributes.
    pub fn attributes(&self) -> &AttributeCollection {
        &self.attributes
    }

    /// Returns the attributes mutably.
    pub fn attributes_mut(&mut self) -> &mut AttributeCollection {
        &mut self.attributes
    }

    /// Returns a reference to this record by id.
    pub fn to_entity_reference(&self) -> EntityReference {
        EntityReference::new(self.logical_name.clone(), self.id)
    }
}
