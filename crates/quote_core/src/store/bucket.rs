//! Bucket: one SQLite-backed keyspace of JSON documents.
//!
//! # Responsibility
//! - Execute key/value document operations with cas bookkeeping.
//! - Hold view definitions and answer view queries.
//!
//! # Invariants
//! - All access to the connection goes through one mutex; each operation
//!   takes it exactly once.
//! - Writes allocate their cas inside the same transaction as the write.

use super::cluster::ClusterState;
use super::document::Document;
use super::view::{self, Stale, ViewDefinition, ViewQuery, ViewResult};
use super::{DocumentStore, StoreError, StoreResult};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Longest accepted document key, in bytes.
pub const MAX_KEY_BYTES: usize = 250;

type ViewKey = (String, String);

struct BucketState {
    conn: Connection,
    views: HashMap<ViewKey, ViewDefinition>,
}

/// Handle to an open bucket. Safe to share between threads.
pub struct Bucket {
    name: String,
    cluster: Arc<ClusterState>,
    state: Mutex<BucketState>,
}

impl Bucket {
    pub(super) fn new(name: String, cluster: Arc<ClusterState>, conn: Connection) -> Self {
        Self {
            name,
            cluster,
            state: Mutex::new(BucketState {
                conn,
                views: HashMap::new(),
            }),
        }
    }

    /// Returns the bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a view, replacing any definition with the same design and
    /// name. The index is rebuilt from scratch on its next refresh.
    pub fn define_view(&self, definition: ViewDefinition) -> StoreResult<()> {
        self.with_state(|state| {
            view::reset_index(&mut state.conn, &definition)?;
            info!(
                "event=view_define module=store status=ok bucket={} design={} view={}",
                self.name, definition.design, definition.name
            );
            state
                .views
                .insert((definition.design.clone(), definition.name.clone()), definition);
            Ok(())
        })
    }

    /// Brings a view index up to date. Returns the number of documents
    /// indexed by this refresh.
    pub fn refresh_view(&self, design: &str, view: &str) -> StoreResult<usize> {
        self.with_state(|state| {
            let definition = lookup_view(&state.views, design, view)?;
            view::refresh_index(&mut state.conn, &definition)
        })
    }

    fn with_state<T>(
        &self,
        op: impl FnOnce(&mut BucketState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        if self.cluster.is_closed() {
            return Err(StoreError::Disconnected);
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut state)
    }
}

impl DocumentStore for Bucket {
    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        validate_key(id)?;
        self.with_state(|state| {
            let stored = state
                .conn
                .query_row(
                    "SELECT body, cas FROM documents WHERE id = ?1;",
                    [id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            stored
                .map(|(body, cas)| view::decode_document(id.to_string(), &body, cas))
                .transpose()
        })
    }

    fn insert(&self, document: &Document) -> StoreResult<Document> {
        validate_key(&document.id)?;
        let body = serde_json::to_string(&document.content)?;
        self.with_state(|state| {
            let tx = state.conn.transaction()?;
            let cas = next_cas(&tx)?;
            let inserted = tx.execute(
                "INSERT INTO documents (id, body, cas) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO NOTHING;",
                params![document.id, body, cas],
            )?;
            if inserted == 0 {
                return Err(StoreError::DocumentAlreadyExists(document.id.clone()));
            }
            tx.commit()?;
            stored_copy(document, cas)
        })
    }

    fn replace(&self, document: &Document) -> StoreResult<Document> {
        validate_key(&document.id)?;
        let body = serde_json::to_string(&document.content)?;
        self.with_state(|state| {
            let tx = state.conn.transaction()?;
            let current: Option<i64> = tx
                .query_row(
                    "SELECT cas FROM documents WHERE id = ?1;",
                    [&document.id],
                    |row| row.get(0),
                )
                .optional()?;
            let current = match current {
                Some(cas) => cas_from_db(&document.id, cas)?,
                None => return Err(StoreError::DocumentNotFound(document.id.clone())),
            };
            if document.cas != 0 && document.cas != current {
                return Err(StoreError::CasMismatch {
                    id: document.id.clone(),
                    expected: document.cas,
                    actual: current,
                });
            }

            let cas = next_cas(&tx)?;
            tx.execute(
                "UPDATE documents
                 SET
                    body = ?2,
                    cas = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![document.id, body, cas],
            )?;
            tx.commit()?;
            stored_copy(document, cas)
        })
    }

    fn upsert(&self, document: &Document) -> StoreResult<Document> {
        validate_key(&document.id)?;
        let body = serde_json::to_string(&document.content)?;
        self.with_state(|state| {
            let tx = state.conn.transaction()?;
            let cas = next_cas(&tx)?;
            tx.execute(
                "INSERT INTO documents (id, body, cas) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    body = excluded.body,
                    cas = excluded.cas,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![document.id, body, cas],
            )?;
            tx.commit()?;
            stored_copy(document, cas)
        })
    }

    fn query(&self, query: &ViewQuery) -> StoreResult<ViewResult> {
        self.with_state(|state| {
            let definition = lookup_view(&state.views, &query.design, &query.view)?;
            if query.stale == Stale::False {
                view::refresh_index(&mut state.conn, &definition)?;
            }
            let result = view::read_index(&state.conn, query)?;
            if query.stale == Stale::UpdateAfter {
                if let Err(err) = view::refresh_index(&mut state.conn, &definition) {
                    warn!(
                        "event=view_refresh module=store status=error bucket={} design={} view={} error={}",
                        self.name, definition.design, definition.name, err
                    );
                }
            }
            Ok(result)
        })
    }
}

fn lookup_view(
    views: &HashMap<ViewKey, ViewDefinition>,
    design: &str,
    view: &str,
) -> StoreResult<ViewDefinition> {
    views
        .get(&(design.to_string(), view.to_string()))
        .cloned()
        .ok_or_else(|| StoreError::ViewNotFound {
            design: design.to_string(),
            view: view.to_string(),
        })
}

fn validate_key(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".to_string()));
    }
    if id.len() > MAX_KEY_BYTES {
        return Err(StoreError::InvalidKey(format!(
            "key is {} bytes, limit is {MAX_KEY_BYTES}",
            id.len()
        )));
    }
    Ok(())
}

fn next_cas(tx: &Transaction<'_>) -> StoreResult<i64> {
    let cas = tx.query_row(
        "UPDATE bucket_state SET last_cas = last_cas + 1 WHERE id = 1 RETURNING last_cas;",
        [],
        |row| row.get(0),
    )?;
    Ok(cas)
}

fn cas_from_db(id: &str, cas: i64) -> StoreResult<u64> {
    u64::try_from(cas).map_err(|_| StoreError::InvalidDocument {
        id: id.to_string(),
        message: format!("negative cas `{cas}`"),
    })
}

fn stored_copy(document: &Document, cas: i64) -> StoreResult<Document> {
    Ok(document.with_cas(cas_from_db(&document.id, cas)?))
}

#[cfg(test)]
mod tests {
    use super::{validate_key, MAX_KEY_BYTES};
    use crate::store::StoreError;

    #[test]
    fn validate_key_rejects_empty_and_oversized_keys() {
        assert!(matches!(validate_key(""), Err(StoreError::InvalidKey(_))));
        let too_long = "k".repeat(MAX_KEY_BYTES + 1);
        assert!(matches!(
            validate_key(&too_long),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(validate_key(&"k".repeat(MAX_KEY_BYTES)).is_ok());
    }
}
