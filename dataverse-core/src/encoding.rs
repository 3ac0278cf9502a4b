//! Web API value encoding helpers.
//!
//! These functions produce the literal text forms the Web API expects for
//! scalar attribute values, timestamps and alternate-key segments.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::error::{DataverseError, Result};
use crate::value::{AttributeValue, KeyAttributeCollection, OptionSetValue};

/// Wire format for date/time values: millisecond precision, literal `Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats an instant as `YYYY-MM-DDTHH:mm:ss.fffZ` in UTC.
pub fn format_timestamp<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    value.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp produced by [`format_timestamp`] (or any RFC 3339 instant).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DataverseError::Serialization(format!("invalid timestamp '{value}': {e}")))
}

/// Formats a guid in parenthesized form, e.g. `(3f2504e0-4f89-11d3-9a0c-0305e82c3301)`.
pub fn parenthesized_guid(id: &Uuid) -> String {
    format!("({})", id.hyphenated())
}

/// Joins multi-select option values with `,`.
///
/// An empty collection has no wire representation and yields `None`, which the
/// translator emits as `null` to clear the field.
pub fn encode_option_set_collection(values: &[OptionSetValue]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let joined = values
        .iter()
        .map(|v| v.value().to_string())
        .collect::<Vec<_>>()
        .join(",");
    Some(joined)
}

/// Encodes a non-lookup attribute value to its Web API text form.
///
/// Returns `None` for values that are sent as `null`. Booleans are written
/// in lowercase, `true` or `false`.
pub fn encode_value(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::String(s) => Some(s.clone()),
        AttributeValue::Integer(v) => Some(v.to_string()),
        AttributeValue::BigInt(v) => Some(v.to_string()),
        AttributeValue::Double(v) => Some(v.to_string()),
        AttributeValue::Decimal(v) => Some(v.to_string()),
        AttributeValue::Boolean(v) => Some(v.to_string()),
        AttributeValue::DateTime(v) => Some(format_timestamp(v)),
        AttributeValue::Money(v) => Some(v.value().to_string()),
        AttributeValue::Guid(v) => Some(v.hyphenated().to_string()),
        AttributeValue::EntityReference(r) => Some(r.id().hyphenated().to_string()),
        AttributeValue::OptionSet(v) => Some(v.value().to_string()),
        AttributeValue::OptionSetCollection(values) => encode_option_set_collection(values),
        AttributeValue::KeyAttributes(keys) => Some(encode_alt_keys(keys)),
        AttributeValue::Null => None,
    }
}

/// Encodes an alternate-key collection as a Web API key segment.
///
/// Lookup parts become `_{key}_value=({id})`, text parts `{key}='{value}'`
/// and numeric-like parts `{key}={value}`. Parts are joined with `,`.
///
/// ```
/// use dataverse_core::encoding::encode_alt_keys;
/// use dataverse_core::value::KeyAttributeCollection;
///
/// let keys: KeyAttributeCollection =
///     [("accountnumber", dataverse_core::AttributeValue::from("12345"))].into_iter().collect();
/// assert_eq!(encode_alt_keys(&keys), "accountnumber='12345'");
/// ```
pub fn encode_alt_keys(keys: &KeyAttributeCollection) -> String {
    keys.iter()
        .map(|(key, value)| encode_alt_key_part(key, value))
        .collect::<Vec<_>>()
        .join(",")
}

fn encode_alt_key_part(key: &str, value: &AttributeValue) -> String {
    match value {
        AttributeValue::EntityReference(r) => {
            format!("_{}_value={}", key, parenthesized_guid(&r.id()))
        }
        AttributeValue::Integer(_)
        | AttributeValue::BigInt(_)
        | AttributeValue::Double(_)
        | AttributeValue::Decimal(_)
        | AttributeValue::Money(_)
        | AttributeValue::Boolean(_)
        | AttributeValue::OptionSet(_)
        | AttributeValue::Guid(_)
        | AttributeValue::DateTime(_) => {
            format!("{}={}", key, encode_value(value).unwrap_or_default())
        }
        AttributeValue::Null => format!("{key}=null"),
        other => {
            let raw = encode_value(other).unwrap_or_default();
            format!("{}='{}'", key, raw.replace('\'', "''"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EntityReference;
    use chrono::FixedOffset;

    #[test]
    fn test_format_timestamp_millis_and_z() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(678);
        assert_eq!(format_timestamp(&dt), "2024-01-02T03:04:05.678Z");
    }

    #[test]
    fn test_format_timestamp_pads_zero_millis() {
        let dt = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_timestamp(&dt), "2023-12-31T23:59:59.000Z");
    }

    #[test]
    fn test_format_timestamp_converts_offset_to_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let dt = offset.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "2024-06-01T08:30:00.000Z");
    }

    #[test]
    fn test_format_timestamp_truncates_sub_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(1_999);
        assert_eq!(format_timestamp(&dt), "2024-01-01T00:00:00.001Z");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let samples = [
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(1),
            Utc.with_ymd_and_hms(2099, 12, 31, 23, 59, 59).unwrap()
                + chrono::Duration::microseconds(999_999),
        ];
        for t in samples {
            let formatted = format_timestamp(&t);
            let reparsed = parse_timestamp(&formatted).unwrap();
            assert_eq!(format_timestamp(&reparsed), formatted);
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, DataverseError::Serialization(_)));
    }

    #[test]
    fn test_option_set_collection_joined() {
        let values = vec![OptionSetValue::new(1), OptionSetValue::new(20), OptionSetValue::new(3)];
        assert_eq!(encode_option_set_collection(&values).as_deref(), Some("1,20,3"));
    }

    #[test]
    fn test_option_set_collection_single_has_no_separator() {
        let values = vec![OptionSetValue::new(7)];
        assert_eq!(encode_option_set_collection(&values).as_deref(), Some("7"));
    }

    #[test]
    fn test_option_set_collection_empty_is_null() {
        assert_eq!(encode_option_set_collection(&[]), None);
    }

    #[test]
    fn test_alt_keys_single_text() {
        let keys: KeyAttributeCollection =
            [("accountnumber", AttributeValue::from("12345"))].into_iter().collect();
        assert_eq!(encode_alt_keys(&keys), "accountnumber='12345'");
    }

    #[test]
    fn test_alt_keys_text_and_number() {
        let keys: KeyAttributeCollection = [
            ("accountnumber", AttributeValue::from("12345")),
            ("statuscode", AttributeValue::from(1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(encode_alt_keys(&keys), "accountnumber='12345',statuscode=1");
    }

    #[test]
    fn test_alt_keys_entity_reference() {
        let id = Uuid::parse_str("3f2504e0-4f89-11d3-9a0c-0305e82c3301").unwrap();
        let keys: KeyAttributeCollection =
            [("parentid", AttributeValue::from(EntityReference::new("account", id)))]
                .into_iter()
                .collect();
        let encoded = encode_alt_keys(&keys);
        assert_eq!(encoded, "_parentid_value=(3f2504e0-4f89-11d3-9a0c-0305e82c3301)");
        assert!(!encoded.ends_with(','));
    }

    #[test]
    fn test_alt_keys_escape_quotes() {
        let keys: KeyAttributeCollection =
            [("name", AttributeValue::from("O'Brien"))].into_iter().collect();
        assert_eq!(encode_alt_keys(&keys), "name='O''Brien'");
    }

    #[test]
    fn test_alt_keys_empty() {
        assert_eq!(encode_alt_keys(&KeyAttributeCollection::new()), "");
    }

    #[test]
    fn test_encode_value_boolean_and_null() {
        assert_eq!(encode_value(&AttributeValue::Boolean(true)).as_deref(), Some("true"));
        assert_eq!(encode_value(&AttributeValue::Boolean(false)).as_deref(), Some("false"));
        assert_eq!(encode_value(&AttributeValue::Null), None);
    }

    #[test]
    fn test_encode_value_guid_hyphenated() {
        let id = Uuid::parse_str("3F2504E0-4F89-11D3-9A0C-0305E82C3301").unwrap();
        assert_eq!(
            encode_value(&AttributeValue::Guid(id)).as_deref(),
            Some("3f2504e0-4f89-11d3-9a0c-0305e82c3301")
        );
    }

    #[test]
    fn test_parenthesized_guid() {
        assert_eq!(
            parenthesized_guid(&Uuid::nil()),
            "(00000000-0000-0000-0000-000000000000)"
        );
    }
}
