//! Quote repository over a document store.
//!
//! # Responsibility
//! - Map `Quote` values onto documents keyed by name.
//! - Decide between insert and replace on upsert.
//! - Normalize view rows and documents back into `Quote` values.
//!
//! # Invariants
//! - One read precedes every write; each upsert performs exactly one write.
//! - A create that loses a race to another writer reports `Ok(false)` and
//!   never falls back to replace.
//! - A replace is always based on the cas of the document it read.
//! - Read failures other than a missing key are returned, never treated as
//!   "not found".

use crate::model::quote::{Quote, NAME_FIELD, QUOTE_FIELD};
use crate::store::{
    Bucket, Document, DocumentStore, Stale, StoreError, ViewDefinition, ViewQuery,
};
use log::{debug, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Design document holding the quote views.
pub const QUOTE_DESIGN_DOC: &str = "nameAndQuote";
/// View emitting `(name, quote)` for every quote document.
pub const NAME_AND_QUOTE_VIEW: &str = "name_and_quote";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for quote persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored quote: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Repository interface for quote operations.
pub trait QuoteRepository {
    /// Inserts the quote, or updates the existing document with the same name.
    ///
    /// Returns `Ok(false)` only when the insert path lost a race to a
    /// concurrent writer of the same name.
    fn upsert_quote(&self, quote: &Quote) -> RepoResult<bool>;
    /// Returns every quote in `name_and_quote` index order.
    fn fetch_all_quotes(&self) -> RepoResult<Vec<Quote>>;
    /// Returns the quote stored under `name`, if any.
    fn get_quote(&self, name: &str) -> RepoResult<Option<Quote>>;
}

/// Builds the `nameAndQuote/name_and_quote` view definition.
pub fn name_and_quote_view() -> ViewDefinition {
    ViewDefinition::new(QUOTE_DESIGN_DOC, NAME_AND_QUOTE_VIEW, emit_name_and_quote)
}

/// Registers the views this repository queries on `bucket`.
pub fn provision_views(bucket: &Bucket) -> RepoResult<()> {
    bucket.define_view(name_and_quote_view())?;
    Ok(())
}

fn emit_name_and_quote(document: &Document) -> Vec<(Value, Value)> {
    match (document.get_str(NAME_FIELD), document.get_str(QUOTE_FIELD)) {
        (Some(name), Some(quote)) => vec![(Value::from(name), Value::from(quote))],
        _ => Vec::new(),
    }
}

/// Quote repository backed by any `DocumentStore`.
pub struct QuoteStore<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> QuoteStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Looks up the raw document for `id`.
    ///
    /// `Ok(None)` is a plain miss; any other failure is an error.
    pub fn fetch_by_key(&self, id: &str) -> RepoResult<Option<Document>> {
        let document = self.store.get(id)?;
        if document.is_none() {
            debug!("event=doc_get module=repo status=miss key={id}");
        }
        Ok(document)
    }
}

impl<S: DocumentStore> QuoteRepository for QuoteStore<S> {
    fn upsert_quote(&self, quote: &Quote) -> RepoResult<bool> {
        match self.fetch_by_key(quote.key())? {
            None => match self.store.insert(&Document::new(quote.key(), quote.to_content())) {
                Ok(stored) => {
                    info!(
                        "event=quote_upsert module=repo status=ok action=insert key={} cas={}",
                        quote.key(),
                        stored.cas
                    );
                    Ok(true)
                }
                Err(StoreError::DocumentAlreadyExists(_)) => {
                    warn!(
                        "event=quote_upsert module=repo status=conflict action=insert key={}",
                        quote.key()
                    );
                    Ok(false)
                }
                Err(err) => Err(err.into()),
            },
            Some(mut loaded) => {
                quote.write_into(&mut loaded.content);
                let stored = self.store.replace(&loaded)?;
                info!(
                    "event=quote_upsert module=repo status=ok action=replace key={} cas={}",
                    quote.key(),
                    stored.cas
                );
                Ok(true)
            }
        }
    }

    fn fetch_all_quotes(&self) -> RepoResult<Vec<Quote>> {
        let started_at = Instant::now();
        let query = ViewQuery::from(QUOTE_DESIGN_DOC, NAME_AND_QUOTE_VIEW).stale(Stale::False);
        let result = self.store.query(&query)?;

        let quotes: Vec<Quote> = result
            .rows
            .into_iter()
            .map(|row| Quote::new(value_to_text(&row.key), value_to_text(&row.value)))
            .collect();

        info!(
            "event=quote_fetch_all module=repo status=ok rows={} duration_ms={}",
            quotes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(quotes)
    }

    fn get_quote(&self, name: &str) -> RepoResult<Option<Quote>> {
        self.fetch_by_key(name)?
            .map(|document| parse_quote_document(&document))
            .transpose()
    }
}

fn parse_quote_document(document: &Document) -> RepoResult<Quote> {
    let name = match document.content.get(NAME_FIELD) {
        None => document.id.clone(),
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(RepoError::InvalidData(format!(
                "field `{NAME_FIELD}` of `{}` must be a string, found `{other}`",
                document.id
            )));
        }
    };
    let quote = match document.content.get(QUOTE_FIELD) {
        Some(Value::String(quote)) => quote.clone(),
        Some(other) => {
            return Err(RepoError::InvalidData(format!(
                "field `{QUOTE_FIELD}` of `{}` must be a string, found `{other}`",
                document.id
            )));
        }
        None => {
            return Err(RepoError::InvalidData(format!(
                "document `{}` has no `{QUOTE_FIELD}` field",
                document.id
            )));
        }
    };
    Ok(Quote { name, quote })
}

/// Renders an index key or value as text: strings verbatim, anything else
/// as compact JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{emit_name_and_quote, parse_quote_document, value_to_text, RepoError};
    use crate::store::Document;
    use serde_json::{json, Map, Value};

    fn document(id: &str, body: Value) -> Document {
        match body {
            Value::Object(map) => Document::new(id, map),
            _ => Document::new(id, Map::new()),
        }
    }

    #[test]
    fn value_to_text_keeps_strings_verbatim() {
        assert_eq!(value_to_text(&json!("Alice")), "Alice");
        assert_eq!(value_to_text(&json!(42)), "42");
        assert_eq!(value_to_text(&json!(["a", 1])), "[\"a\",1]");
        assert_eq!(value_to_text(&Value::Null), "null");
    }

    #[test]
    fn map_function_skips_documents_without_both_fields() {
        let full = document("Alice", json!({"name": "Alice", "quote": "Hello"}));
        assert_eq!(
            emit_name_and_quote(&full),
            vec![(json!("Alice"), json!("Hello"))]
        );

        let missing_quote = document("Bob", json!({"name": "Bob"}));
        assert!(emit_name_and_quote(&missing_quote).is_empty());

        let numeric_name = document("7", json!({"name": 7, "quote": "x"}));
        assert!(emit_name_and_quote(&numeric_name).is_empty());
    }

    #[test]
    fn parse_quote_document_falls_back_to_key_for_name() {
        let doc = document("Carol", json!({"quote": "Hi"}));
        let quote = parse_quote_document(&doc).unwrap();
        assert_eq!(quote.name, "Carol");
        assert_eq!(quote.quote, "Hi");
    }

    #[test]
    fn parse_quote_document_rejects_missing_quote() {
        let doc = document("Dave", json!({"name": "Dave"}));
        let err = parse_quote_document(&doc).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(message) if message.contains("quote")));
    }
}
