//! Schema documents on arbitrary input: parse, then normalize.
//!
//! Run with: cargo +nightly fuzz run schema_source_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_dsl::{compile, SchemaSource};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Errors are fine, panics are not.
        for parsed in [SchemaSource::from_json(input), SchemaSource::from_yaml(input)] {
            if let Ok(source) = parsed {
                if let Ok(schema) = compile(&source, "fuzz", 1) {
                    assert_eq!(schema.name, "fuzz");
                }
            }
        }
    }
});
