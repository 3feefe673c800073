//! Untyped adapter output, close to each source's native shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw candidate record as fetched from a source (HTML-extracted fields,
/// RSS entry, JSON API item). The normalizer maps these into the canonical
/// schema; adapters never persist them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_name: String,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            fields: Map::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// String field lookup; trims and treats empty strings as absent.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn payload(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
