//! Quote use-case service with an explicit connection lifecycle.
//!
//! # Responsibility
//! - Connect the cluster, open the bucket and provision views at startup.
//! - Provide stable quote entry points for callers.
//! - Release the cluster at shutdown.
//!
//! # Invariants
//! - Service APIs never bypass the repository contracts.
//! - After `shutdown` the service is consumed; no call can reach a closed
//!   cluster through it.

use crate::model::quote::Quote;
use crate::repo::quote_repo::{provision_views, QuoteRepository, QuoteStore, RepoResult};
use crate::store::{Bucket, Cluster, ClusterConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bucket used when none is configured.
pub const DEFAULT_BUCKET: &str = "default";

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

/// Startup configuration for `QuoteService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub cluster: ClusterConfig,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::InMemory,
            bucket: default_bucket(),
        }
    }
}

/// Owns the cluster connection and the quote repository built on it.
pub struct QuoteService {
    cluster: Cluster,
    quotes: QuoteStore<Arc<Bucket>>,
}

impl QuoteService {
    /// Connects, opens the configured bucket and provisions quote views.
    pub fn start(config: &ServiceConfig) -> RepoResult<Self> {
        let cluster = Cluster::connect(config.cluster.clone())?;
        let bucket = cluster.open_bucket(&config.bucket)?;
        provision_views(&bucket)?;
        info!(
            "event=service_start module=service status=ok bucket={}",
            bucket.name()
        );
        Ok(Self {
            cluster,
            quotes: QuoteStore::new(bucket),
        })
    }

    /// See `QuoteRepository::upsert_quote`.
    pub fn upsert_quote(&self, quote: &Quote) -> RepoResult<bool> {
        self.quotes.upsert_quote(quote)
    }

    /// See `QuoteRepository::fetch_all_quotes`.
    pub fn fetch_all_quotes(&self) -> RepoResult<Vec<Quote>> {
        self.quotes.fetch_all_quotes()
    }

    /// See `QuoteRepository::get_quote`.
    pub fn get_quote(&self, name: &str) -> RepoResult<Option<Quote>> {
        self.quotes.get_quote(name)
    }

    /// Returns the bucket backing this service.
    pub fn bucket(&self) -> &Arc<Bucket> {
        self.quotes.store()
    }

    /// Disconnects the cluster.
    pub fn shutdown(self) {
        self.cluster.disconnect();
        info!("event=service_shutdown module=service status=ok");
    }
}
