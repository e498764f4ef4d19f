//! Embedded document store: clusters, buckets, documents and views.
//!
//! # Responsibility
//! - Provide key/value document operations (`get`, `insert`, `replace`,
//!   `upsert`) with per-document cas tokens.
//! - Provide server-side style views with selectable staleness.
//! - Own the connection lifecycle (`connect`, `open_bucket`, `disconnect`).
//!
//! # Invariants
//! - Every successful write assigns a cas strictly greater than any earlier
//!   cas in the same bucket.
//! - `insert` never overwrites; `replace` never creates.
//! - After `Cluster::disconnect`, every bucket operation fails with
//!   `StoreError::Disconnected`.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod bucket;
mod cluster;
mod document;
mod view;

pub use bucket::{Bucket, MAX_KEY_BYTES};
pub use cluster::{Cluster, ClusterConfig};
pub use document::Document;
pub use view::{Stale, ViewDefinition, ViewMapFn, ViewQuery, ViewResult, ViewRow};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by document store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidKey(String),
    InvalidBucketName(String),
    InvalidDocument { id: String, message: String },
    DocumentNotFound(String),
    DocumentAlreadyExists(String),
    CasMismatch { id: String, expected: u64, actual: u64 },
    ViewNotFound { design: String, view: String },
    Disconnected,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
            Self::InvalidKey(message) => write!(f, "invalid document key: {message}"),
            Self::InvalidBucketName(name) => write!(f, "invalid bucket name `{name}`"),
            Self::InvalidDocument { id, message } => {
                write!(f, "invalid document `{id}`: {message}")
            }
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::DocumentAlreadyExists(id) => write!(f, "document already exists: {id}"),
            Self::CasMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "cas mismatch on `{id}`: expected {expected}, stored {actual}"
            ),
            Self::ViewNotFound { design, view } => write!(f, "view not found: {design}/{view}"),
            Self::Disconnected => write!(f, "cluster is disconnected"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Key/value document operations consumed by repositories.
///
/// `Bucket` is the production implementation; tests may wrap it to inject
/// interleavings.
pub trait DocumentStore {
    /// Looks up a document. `Ok(None)` means the key does not exist.
    fn get(&self, id: &str) -> StoreResult<Option<Document>>;
    /// Creates a document; fails with `DocumentAlreadyExists` if the key is taken.
    fn insert(&self, document: &Document) -> StoreResult<Document>;
    /// Overwrites an existing document, checking `document.cas` when non-zero.
    fn replace(&self, document: &Document) -> StoreResult<Document>;
    /// Creates or overwrites a document unconditionally.
    fn upsert(&self, document: &Document) -> StoreResult<Document>;
    /// Reads rows from a view index.
    fn query(&self, query: &ViewQuery) -> StoreResult<ViewResult>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        (**self).get(id)
    }

    fn insert(&self, document: &Document) -> StoreResult<Document> {
        (**self).insert(document)
    }

    fn replace(&self, document: &Document) -> StoreResult<Document> {
        (**self).replace(document)
    }

    fn upsert(&self, document: &Document) -> StoreResult<Document> {
        (**self).upsert(document)
    }

    fn query(&self, query: &ViewQuery) -> StoreResult<ViewResult> {
        (**self).query(query)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        (**self).get(id)
    }

    fn insert(&self, document: &Document) -> StoreResult<Document> {
        (**self).insert(document)
    }

    fn replace(&self, document: &Document) -> StoreResult<Document> {
        (**self).replace(document)
    }

    fn upsert(&self, document: &Document) -> StoreResult<Document> {
        (**self).upsert(document)
    }

    fn query(&self, query: &ViewQuery) -> StoreResult<ViewResult> {
        (**self).query(query)
    }
}
