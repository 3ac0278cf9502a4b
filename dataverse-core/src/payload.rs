//! Ordered Web API request payloads.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{DataverseError, Result};

/// Suffix marking a field as a lookup binding.
pub const ODATA_BIND_SUFFIX: &str = "@odata.bind";

/// One translated field: Web API key and encoded value (`None` means `null`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedField {
    key: String,
    value: Option<String>,
}

impl SerializedField {
    /// Creates a field. The key must not be empty.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(DataverseError::InvalidInput(
                "serialized field key must not be empty".to_string(),
            ));
        }
        Ok(Self { key, value })
    }

    /// Returns the Web API key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the encoded value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns true if this field binds a lookup.
    pub fn is_binding(&self) -> bool {
        self.key.ends_with(ODATA_BIND_SUFFIX)
    }
}

/// A translated attribute payload, in input attribute order.
///
/// Serializes to a JSON object whose members keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebApiPayload {
    fields: Vec<SerializedField>,
}

impl WebApiPayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, field: SerializedField) {
        self.fields.push(field);
    }

    /// Returns the fields.
    pub fn fields(&self) -> &[SerializedField] {
        &self.fields
    }

    /// Returns the value of the first field with `key`.
    ///
    /// The outer `Option` is `None` when the key is absent.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.fields.iter().find(|f| f.key == key).map(|f| f.value())
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|f| (f.key(), f.value()))
    }

    /// Renders the payload as a JSON object string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DataverseError::Serialization(e.to_string()))
    }
}

impl Serialize for WebApiPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.key, &field.value)?;
        }
        map.end()
    }
}

impl IntoIterator for WebApiPayload {
    type Item = SerializedField;
    type IntoIter = std::vec::IntoIter<SerializedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
