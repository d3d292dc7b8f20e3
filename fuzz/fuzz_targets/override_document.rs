//! Fuzz target for override documents layered on top of a URI.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_override_document
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value, json};
use tessera_core::{ConnectOptions, OptionsOverride};

/// Top-level keys an override document understands, including aliases.
const KNOWN_KEYS: &[&str] = &[
    "host",
    "port",
    "database",
    "user",
    "password",
    "ssl",
    "connectTimeout",
    "connect_timeout",
    "properties",
];

#[derive(Debug, Arbitrary)]
enum Field {
    Absent,
    Null,
    Text(String),
    Number(u32),
    Flag(bool),
}

impl Field {
    fn to_json(&self) -> Option<Value> {
        match self {
            Field::Absent => None,
            Field::Null => Some(Value::Null),
            Field::Text(s) => Some(json!(s)),
            Field::Number(n) => Some(json!(n)),
            Field::Flag(b) => Some(json!(b)),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Document {
    host: Field,
    port: Field,
    database: Field,
    user: Field,
    password: Field,
    ssl: Field,
    connect_timeout: Field,
    properties: Vec<(String, Field)>,
    extra_key: Option<String>,
}

fuzz_target!(|doc: Document| {
    let mut object = Map::new();
    for (key, field) in [
        ("host", &doc.host),
        ("port", &doc.port),
        ("database", &doc.database),
        ("user", &doc.user),
        ("password", &doc.password),
        ("ssl", &doc.ssl),
        ("connectTimeout", &doc.connect_timeout),
    ] {
        if let Some(value) = field.to_json() {
            object.insert(key.to_string(), value);
        }
    }
    if !doc.properties.is_empty() {
        let properties: Map<String, Value> = doc
            .properties
            .iter()
            .filter_map(|(k, f)| f.to_json().map(|v| (k.clone(), v)))
            .collect();
        object.insert("properties".to_string(), Value::Object(properties));
    }
    // Only genuinely unknown keys; a known one would shadow its field above.
    if let Some(extra) = doc.extra_key.as_ref().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        object.insert(extra.clone(), Value::Null);
    }

    let base = ConnectOptions::builder()
        .host("db")
        .port(5432)
        .user("app")
        .property("keep", "me")
        .build();

    // Invalid documents are rejected, valid ones always merge.
    if let Ok(overrides) = OptionsOverride::from_json(&Value::Object(object)) {
        let merged = base.apply_overrides(&overrides);
        if matches!(doc.host, Field::Absent) {
            assert_eq!(merged.host(), "db");
        }
        // An empty document is the identity.
        let empty = OptionsOverride::from_json(&json!({})).unwrap();
        assert_eq!(merged.apply_overrides(&empty), merged);
    }
});
