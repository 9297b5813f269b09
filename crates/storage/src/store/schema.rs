#![forbid(unsafe_code)]

use super::{StoreError, now_ms};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub(crate) const SCHEMA_VERSION: i64 = 1;

const REQUIRED_TABLES: &[&str] = &[
    "store_state",
    "object_types",
    "objects",
    "blocks",
    "block_refs",
    "block_search",
    "idempotency",
];

/// FTS5 keeps its postings in shadow tables named after the virtual table.
const SEARCH_SHADOW_PREFIX: &str = "block_search_";

pub(crate) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let unsupported = tables.iter().any(|table| {
        !REQUIRED_TABLES.contains(&table.as_str()) && !table.starts_with(SEARCH_SHADOW_PREFIX)
    });
    if unsupported {
        return Err(StoreError::validation(
            "RESET_REQUIRED: unsupported tables detected",
        ));
    }

    if REQUIRED_TABLES.iter().any(|table| !tables.contains(*table)) {
        return Err(StoreError::validation(
            "RESET_REQUIRED: required table is missing",
        ));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::validation(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::validation(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

pub(crate) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS object_types (
          id TEXT PRIMARY KEY,
          key TEXT NOT NULL UNIQUE,
          name TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS objects (
          id TEXT PRIMARY KEY,
          type_id TEXT NOT NULL,
          title TEXT NOT NULL,
          properties_json TEXT NOT NULL,
          doc_version INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          deleted_at_ms INTEGER,
          FOREIGN KEY(type_id) REFERENCES object_types(id) ON DELETE RESTRICT,
          CHECK(doc_version >= 0)
        );

        CREATE INDEX IF NOT EXISTS idx_objects_type ON objects(type_id);

        CREATE TABLE IF NOT EXISTS blocks (
          id TEXT PRIMARY KEY,
          object_id TEXT NOT NULL,
          parent_block_id TEXT,
          order_key TEXT NOT NULL,
          block_type TEXT NOT NULL,
          content_json TEXT NOT NULL,
          meta_json TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          deleted_at_ms INTEGER,
          FOREIGN KEY(object_id) REFERENCES objects(id) ON DELETE CASCADE,
          FOREIGN KEY(parent_block_id) REFERENCES blocks(id) ON DELETE RESTRICT,
          CHECK(parent_block_id IS NULL OR parent_block_id <> id)
        );

        CREATE INDEX IF NOT EXISTS idx_blocks_object_parent
          ON blocks(object_id, parent_block_id);

        -- Root-level siblings are covered too: a NULL parent collapses to ''.
        CREATE UNIQUE INDEX IF NOT EXISTS ux_blocks_live_sibling_order
          ON blocks(object_id, COALESCE(parent_block_id, ''), order_key)
          WHERE deleted_at_ms IS NULL;

        CREATE TABLE IF NOT EXISTS block_refs (
          source_block_id TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          source_object_id TEXT NOT NULL,
          target_object_id TEXT NOT NULL,
          target_block_id TEXT,
          PRIMARY KEY(source_block_id, ordinal),
          FOREIGN KEY(source_block_id) REFERENCES blocks(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_block_refs_target
          ON block_refs(target_object_id, target_block_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS block_search USING fts5(
          block_id UNINDEXED,
          object_id UNINDEXED,
          text,
          tokenize = 'unicode61 remove_diacritics 2'
        );

        CREATE TABLE IF NOT EXISTS idempotency (
          object_id TEXT NOT NULL,
          key TEXT NOT NULL,
          result_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(object_id, key),
          FOREIGN KEY(object_id) REFERENCES objects(id) ON DELETE CASCADE
        );
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
