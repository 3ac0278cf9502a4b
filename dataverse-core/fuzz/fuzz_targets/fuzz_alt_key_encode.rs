#![no_main]

use libfuzzer_sys::fuzz_target;
use dataverse_core::encoding::encode_alt_keys;
use dataverse_core::{AttributeValue, KeyAttributeCollection};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut keys = KeyAttributeCollection::new();
    for (i, part) in text.split('\n').enumerate() {
        match i % 3 {
            0 => keys.insert(format!("k{i}"), AttributeValue::from(part)),
            1 => keys.insert(format!("k{i}"), AttributeValue::Integer(part.len() as i32)),
            _ => keys.insert(format!("k{i}"), AttributeValue::Boolean(part.is_empty())),
        }
    }

    let encoded = encode_alt_keys(&keys);
    assert!(!encoded.ends_with(','));
    assert_eq!(encoded.is_empty(), keys.is_empty());
});
