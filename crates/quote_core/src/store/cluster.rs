//! Cluster connection lifecycle and bucket registry.
//!
//! # Invariants
//! - Opening the same bucket name twice on one cluster yields the same handle.
//! - `disconnect` is idempotent and cannot be undone.

use super::bucket::Bucket;
use super::{StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

const BUCKET_FILE_SUFFIX: &str = "bucket.sqlite3";
const MAX_BUCKET_NAME_CHARS: usize = 100;

/// Where bucket data lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClusterConfig {
    /// One SQLite file per bucket inside `path`.
    Directory { path: PathBuf },
    /// Buckets live in memory for the lifetime of the cluster.
    InMemory,
}

impl ClusterConfig {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory { path: path.into() }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Directory { .. } => "directory",
            Self::InMemory => "memory",
        }
    }
}

/// Connection state shared with every bucket opened from a cluster.
#[derive(Debug, Default)]
pub(super) struct ClusterState {
    closed: AtomicBool,
}

impl ClusterState {
    pub(super) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Connected cluster. Create once at startup, pass by reference, and call
/// `disconnect` at shutdown.
pub struct Cluster {
    config: ClusterConfig,
    state: Arc<ClusterState>,
    buckets: Mutex<HashMap<String, Arc<Bucket>>>,
}

impl Cluster {
    /// Connects to the cluster described by `config`.
    ///
    /// # Errors
    /// - `StoreError::Io` when the data directory cannot be created.
    pub fn connect(config: ClusterConfig) -> StoreResult<Self> {
        if let ClusterConfig::Directory { path } = &config {
            std::fs::create_dir_all(path)?;
        }
        info!(
            "event=cluster_connect module=store status=ok mode={}",
            config.mode()
        );
        Ok(Self {
            config,
            state: Arc::new(ClusterState::default()),
            buckets: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        !self.state.is_closed()
    }

    /// Opens a bucket, creating its storage on first use.
    ///
    /// # Errors
    /// - `StoreError::Disconnected` after `disconnect`.
    /// - `StoreError::InvalidBucketName` for names outside `[A-Za-z0-9_.-]{1,100}`.
    /// - `StoreError::Db` when storage bootstrap or migrations fail.
    pub fn open_bucket(&self, name: &str) -> StoreResult<Arc<Bucket>> {
        if self.state.is_closed() {
            return Err(StoreError::Disconnected);
        }
        validate_bucket_name(name)?;

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bucket) = buckets.get(name) {
            return Ok(Arc::clone(bucket));
        }

        let conn = match &self.config {
            ClusterConfig::Directory { path } => {
                open_db(path.join(format!("{name}.{BUCKET_FILE_SUFFIX}")))?
            }
            ClusterConfig::InMemory => open_db_in_memory()?,
        };
        let bucket = Arc::new(Bucket::new(
            name.to_string(),
            Arc::clone(&self.state),
            conn,
        ));
        buckets.insert(name.to_string(), Arc::clone(&bucket));

        info!("event=bucket_open module=store status=ok bucket={name}");
        Ok(bucket)
    }

    /// Releases the cluster. Bucket handles still held by callers stay
    /// allocated but reject every operation.
    pub fn disconnect(&self) {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            let count = buckets.len();
            buckets.clear();
            count
        };
        info!("event=cluster_disconnect module=store status=ok buckets_released={released}");
    }
}

fn validate_bucket_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.chars().count() <= MAX_BUCKET_NAME_CHARS
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidBucketName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_bucket_name, ClusterConfig};

    #[test]
    fn bucket_names_are_restricted() {
        assert!(validate_bucket_name("default").is_ok());
        assert!(validate_bucket_name("quotes-2.v1_test").is_ok());
        assert!(validate_bucket_name("").is_err());
        assert!(validate_bucket_name("../escape").is_err());
        assert!(validate_bucket_name("with space").is_err());
        assert!(validate_bucket_name(&"b".repeat(101)).is_err());
    }

    #[test]
    fn cluster_config_serializes_with_mode_tag() {
        let config = ClusterConfig::directory("/var/lib/quotes");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mode": "directory", "path": "/var/lib/quotes"})
        );

        let decoded: ClusterConfig =
            serde_json::from_value(serde_json::json!({"mode": "in_memory"})).unwrap();
        assert_eq!(decoded, ClusterConfig::InMemory);
    }
}
