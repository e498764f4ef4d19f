//! Bucket schema migration registry and executor.
//!
//! # Responsibility
//! - Register bucket schema migrations (document table and cas counter,
//!   then view index tables) in strictly increasing order.
//! - Bring a bucket file up to the latest schema in one transaction.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A bucket written by a newer binary is never modified.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents",
        sql: include_str!("0001_documents.sql"),
    },
    Migration {
        version: 2,
        name: "view_index",
        sql: include_str!("0002_view_index.sql"),
    },
];

/// Returns the latest bucket schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Upgrades a bucket connection to the latest schema.
///
/// Returns the number of migrations applied; `0` when the bucket was
/// already current.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the bucket was written by a
///   newer binary.
/// - `DbError::Sqlite` when a migration fails; nothing is applied then.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let from_version: u32 =
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let to_version = latest_version();

    if from_version > to_version {
        error!(
            "event=db_migrate module=db status=error from={from_version} latest={to_version} error_code=schema_too_new"
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: to_version,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        info!(
            "event=db_migrate module=db status=step version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from={from_version} to={to_version} applied={}",
        pending.len()
    );
    Ok(u32::try_from(pending.len()).unwrap_or(u32::MAX))
}
