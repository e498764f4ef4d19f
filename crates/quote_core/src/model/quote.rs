//! Quote domain model.
//!
//! # Responsibility
//! - Define the value type exchanged between callers and the quote store.
//! - Own the JSON body shape written to documents.
//!
//! # Invariants
//! - `name` is the document key; at most one stored document exists per name.
//! - `quote` is always present, possibly empty.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body field holding the person's name.
pub const NAME_FIELD: &str = "name";
/// Body field holding the quoted text.
pub const QUOTE_FIELD: &str = "quote";

/// A person's name paired with something they said.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    /// Who said it. Also the storage key.
    pub name: String,
    /// What they said.
    pub quote: String,
}

impl Quote {
    pub fn new(name: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quote: quote.into(),
        }
    }

    /// Returns the document key this quote is stored under.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Builds the `{name, quote}` document body for a fresh insert.
    pub fn to_content(&self) -> Map<String, Value> {
        let mut content = Map::new();
        self.write_into(&mut content);
        content
    }

    /// Overwrites `name` and `quote` on an existing body, leaving other
    /// fields untouched.
    pub fn write_into(&self, content: &mut Map<String, Value>) {
        content.insert(NAME_FIELD.to_string(), Value::String(self.name.clone()));
        content.insert(QUOTE_FIELD.to_string(), Value::String(self.quote.clone()));
    }
}
