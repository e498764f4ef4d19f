//! View definitions, queries and the index maintained for them.
//!
//! # Invariants
//! - Index rows for a view reflect exactly the documents with
//!   `cas <= indexed_cas` for that view.
//! - Rows are ordered by `collate` on their key, then by document id.

use super::document::Document;
use super::{StoreError, StoreResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::time::Instant;

/// Map function of a view: emits `(key, value)` rows for one document.
pub type ViewMapFn = fn(&Document) -> Vec<(Value, Value)>;

/// A named view inside a design document.
#[derive(Clone)]
pub struct ViewDefinition {
    pub design: String,
    pub name: String,
    pub map: ViewMapFn,
}

impl ViewDefinition {
    pub fn new(design: impl Into<String>, name: impl Into<String>, map: ViewMapFn) -> Self {
        Self {
            design: design.into(),
            name: name.into(),
            map,
        }
    }
}

impl Debug for ViewDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("design", &self.design)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How fresh the index must be when a view is queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stale {
    /// Read the index as it is.
    Ok,
    /// Bring the index up to date before reading.
    False,
    /// Read the index as it is, then bring it up to date. A failed refresh
    /// is logged and does not discard the rows already read.
    #[default]
    UpdateAfter,
}

/// Query against one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub design: String,
    pub view: String,
    pub stale: Stale,
    pub limit: Option<u32>,
    pub skip: u32,
    pub descending: bool,
}

impl ViewQuery {
    pub fn from(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            view: view.into(),
            stale: Stale::default(),
            limit: None,
            skip: 0,
            descending: false,
        }
    }

    pub fn stale(mut self, stale: Stale) -> Self {
        self.stale = stale;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

/// One emitted index row.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// Key of the document that emitted the row.
    pub id: String,
    pub key: Value,
    pub value: Value,
}

/// Rows returned by a view query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewResult {
    /// Number of rows in the index, ignoring `limit` and `skip`.
    pub total_rows: u64,
    pub rows: Vec<ViewRow>,
}

/// Registers `definition` in the index tables and drops any rows built by a
/// previous definition of the same view.
pub(super) fn reset_index(conn: &mut Connection, definition: &ViewDefinition) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM view_rows WHERE design = ?1 AND view = ?2;",
        params![definition.design, definition.name],
    )?;
    tx.execute(
        "INSERT INTO view_state (design, view, indexed_cas) VALUES (?1, ?2, 0)
         ON CONFLICT(design, view) DO UPDATE SET indexed_cas = 0;",
        params![definition.design, definition.name],
    )?;
    tx.commit()?;
    Ok(())
}

/// Feeds every document written since the last refresh through the view's
/// map function. Returns the number of documents indexed.
pub(super) fn refresh_index(
    conn: &mut Connection,
    definition: &ViewDefinition,
) -> StoreResult<usize> {
    let started_at = Instant::now();
    let tx = conn.transaction()?;

    let indexed_cas: i64 = tx
        .query_row(
            "SELECT indexed_cas FROM view_state WHERE design = ?1 AND view = ?2;",
            params![definition.design, definition.name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let pending = {
        let mut stmt =
            tx.prepare("SELECT id, body, cas FROM documents WHERE cas > ?1 ORDER BY cas ASC;")?;
        let mut rows = stmt.query([indexed_cas])?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            let cas: i64 = row.get(2)?;
            pending.push((decode_document(id, &body, cas)?, cas));
        }
        pending
    };

    let mut high_water = indexed_cas;
    for (document, cas) in &pending {
        tx.execute(
            "DELETE FROM view_rows WHERE design = ?1 AND view = ?2 AND doc_id = ?3;",
            params![definition.design, definition.name, document.id],
        )?;
        for (emit_seq, (key, value)) in (definition.map)(document).into_iter().enumerate() {
            tx.execute(
                "INSERT INTO view_rows (design, view, doc_id, emit_seq, key_json, value_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    definition.design,
                    definition.name,
                    document.id,
                    i64::try_from(emit_seq).unwrap_or(i64::MAX),
                    serde_json::to_string(&key)?,
                    serde_json::to_string(&value)?,
                ],
            )?;
        }
        high_water = high_water.max(*cas);
    }

    tx.execute(
        "INSERT INTO view_state (design, view, indexed_cas) VALUES (?1, ?2, ?3)
         ON CONFLICT(design, view) DO UPDATE SET indexed_cas = excluded.indexed_cas;",
        params![definition.design, definition.name, high_water],
    )?;
    tx.commit()?;

    debug!(
        "event=view_refresh module=store status=ok design={} view={} documents={} duration_ms={}",
        definition.design,
        definition.name,
        pending.len(),
        started_at.elapsed().as_millis()
    );
    Ok(pending.len())
}

/// Reads rows from the index without refreshing it.
///
/// Rows are ordered by `collate` on their keys, then by document id and
/// emit order; `skip` and `limit` apply after ordering.
pub(super) fn read_index(conn: &Connection, query: &ViewQuery) -> StoreResult<ViewResult> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, emit_seq, key_json, value_json
         FROM view_rows
         WHERE design = ?1 AND view = ?2;",
    )?;
    let mut rows = stmt.query(params![query.design, query.view])?;
    let mut indexed = Vec::new();
    while let Some(row) = rows.next()? {
        let emit_seq: i64 = row.get(1)?;
        let key_json: String = row.get(2)?;
        let value_json: String = row.get(3)?;
        indexed.push((
            emit_seq,
            ViewRow {
                id: row.get(0)?,
                key: serde_json::from_str(&key_json)?,
                value: serde_json::from_str(&value_json)?,
            },
        ));
    }

    indexed.sort_by(|(seq_a, a), (seq_b, b)| {
        let by_key = collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id));
        let by_key = if query.descending {
            by_key.reverse()
        } else {
            by_key
        };
        by_key.then_with(|| seq_a.cmp(seq_b))
    });

    let total_rows = u64::try_from(indexed.len()).unwrap_or(u64::MAX);
    let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

    Ok(ViewResult {
        total_rows,
        rows: indexed
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(_, row)| row)
            .collect(),
    })
}

/// Orders view keys by type first
/// (`null < false < true < numbers < strings < arrays < objects`), then by
/// value within a type: numbers numerically, strings by code point, arrays
/// element-wise, objects by their entries in order.
fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(left, right)| collate(left, right))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((key_a, val_a), (key_b, val_b))| {
                key_a.cmp(key_b).then_with(|| collate(val_a, val_b))
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x.cmp(&y);
    }
    let x = x.as_f64().unwrap_or(f64::NAN);
    let y = y.as_f64().unwrap_or(f64::NAN);
    x.total_cmp(&y)
}

/// Parses a stored body into a document.
pub(super) fn decode_document(id: String, body: &str, cas: i64) -> StoreResult<Document> {
    let content: Map<String, Value> = match serde_json::from_str(body)? {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::InvalidDocument {
                id,
                message: format!("body must be a JSON object, found `{other}`"),
            });
        }
    };
    let cas = u64::try_from(cas).map_err(|_| StoreError::InvalidDocument {
        id: id.clone(),
        message: format!("negative cas `{cas}`"),
    })?;
    Ok(Document { id, content, cas })
}
