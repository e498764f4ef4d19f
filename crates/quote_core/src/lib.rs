//! Quote storage over an embedded document bucket.
//!
//! Quotes are stored one document per person, keyed by name, and read back
//! in bulk through the `nameAndQuote/name_and_quote` view.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::quote::Quote;
pub use repo::quote_repo::{
    name_and_quote_view, provision_views, QuoteRepository, QuoteStore, RepoError, RepoResult,
    NAME_AND_QUOTE_VIEW, QUOTE_DESIGN_DOC,
};
pub use service::quote_service::{QuoteService, ServiceConfig, DEFAULT_BUCKET};
pub use store::{
    Bucket, Cluster, ClusterConfig, Document, DocumentStore, Stale, StoreError, StoreResult,
    ViewDefinition, ViewQuery, ViewResult, ViewRow,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
