#![forbid(unsafe_code)]

mod config;
mod cycle;
mod document;
mod duplicate;
mod error;
mod idempotency;
mod indexes;
mod objects;
mod patch;
mod requests;
mod rows;
mod schema;

pub use config::StoreConfig;
pub use error::StoreError;
pub use requests::*;
pub use rows::*;

use bdoc_core::content::{MAX_JSON_DEPTH, json_depth};
use bdoc_core::{BlockId, BlockRow, ObjectId};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const DB_FILE_NAME: &str = "blockdoc.db";

/// Single-connection store. Writers take `&mut self` and run inside one
/// SQLite transaction each; readers take `&self` and only ever observe
/// committed state.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    config: StoreConfig,
}

impl SqliteStore {
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage_dir)?;

        let db_path = config.storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        schema::preflight_gate(&conn)?;
        schema::install_schema(&conn)?;

        tracing::debug!(path = %db_path.display(), "block store opened");
        Ok(Self { conn, config })
    }

    pub fn open_in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::install_schema(&conn)?;
        Ok(Self { conn, config })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

const OBJECT_COLUMNS: &str =
    "id, type_id, title, properties_json, doc_version, created_at_ms, updated_at_ms, deleted_at_ms";

const BLOCK_COLUMNS: &str = "id, object_id, parent_block_id, order_key, block_type, content_json, \
     meta_json, created_at_ms, updated_at_ms, deleted_at_ms";

fn object_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectRow> {
    Ok(ObjectRow {
        id: row.get(0)?,
        type_id: row.get(1)?,
        title: row.get(2)?,
        properties: row.get::<_, Value>(3)?,
        doc_version: row.get(4)?,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
        deleted_at_ms: row.get(7)?,
    })
}

fn block_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok(BlockRow {
        id: row.get(0)?,
        object_id: row.get(1)?,
        parent_block_id: row.get(2)?,
        order_key: row.get(3)?,
        block_type: row.get(4)?,
        content: row.get::<_, Value>(5)?,
        meta: row.get::<_, Option<Value>>(6)?,
        created_at_ms: row.get(7)?,
        updated_at_ms: row.get(8)?,
        deleted_at_ms: row.get(9)?,
    })
}

/// Live (non-deleted) object or `NOT_FOUND_OBJECT`.
fn live_object(conn: &Connection, object_id: &str) -> Result<ObjectRow, StoreError> {
    conn.query_row(
        &format!("SELECT {OBJECT_COLUMNS} FROM objects WHERE id=?1 AND deleted_at_ms IS NULL"),
        params![object_id],
        object_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::object_not_found(object_id))
}

fn load_block_rows(
    conn: &Connection,
    object_id: &str,
    include_deleted: bool,
) -> Result<Vec<BlockRow>, StoreError> {
    let sql = if include_deleted {
        format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE object_id=?1")
    } else {
        format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE object_id=?1 AND deleted_at_ms IS NULL")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![object_id], block_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Owning object of a block, deleted or not.
fn block_owner(conn: &Connection, block_id: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT object_id FROM blocks WHERE id=?1",
            params![block_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn canonicalize_object(value: &str) -> Result<String, StoreError> {
    ObjectId::try_new(value)
        .map(ObjectId::into_string)
        .map_err(|err| StoreError::validation(err.message()))
}

fn canonicalize_block(value: &str) -> Result<String, StoreError> {
    BlockId::try_new(value)
        .map(BlockId::into_string)
        .map_err(|err| StoreError::validation(err.message()))
}

/// Rejects JSON nested past what can be read back from a column.
fn check_json_depth(field: &str, value: &Value) -> Result<(), StoreError> {
    if json_depth(value) > MAX_JSON_DEPTH {
        return Err(StoreError::validation(format!(
            "{field} nests deeper than {MAX_JSON_DEPTH} levels"
        )));
    }
    Ok(())
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::validation("numeric overflow"))
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
