#![no_main]

use libfuzzer_sys::fuzz_target;
use dataverse_core::encoding::{format_timestamp, parse_timestamp};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(instant) = parse_timestamp(text) {
            let formatted = format_timestamp(&instant);
            let reparsed = parse_timestamp(&formatted).expect("formatted timestamp must parse");
            assert_eq!(format_timestamp(&reparsed), formatted);
        }
    }
});
