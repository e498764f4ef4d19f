//! Stored document value.

use serde_json::{Map, Value};

/// A JSON object body addressed by key, plus its cas token.
///
/// `cas == 0` marks a document that has not been read from or written to a
/// bucket; `replace` treats it as "no cas check".
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: Map<String, Value>,
    pub cas: u64,
}

impl Document {
    pub fn new(id: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            content,
            cas: 0,
        }
    }

    /// Returns a copy carrying the given cas token.
    pub fn with_cas(&self, cas: u64) -> Self {
        Self {
            cas,
            ..self.clone()
        }
    }

    /// Returns a string field of the body, if present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.content.get(field).and_then(Value::as_str)
    }

    /// Sets one body field.
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.content.insert(field.into(), value.into());
    }
}
