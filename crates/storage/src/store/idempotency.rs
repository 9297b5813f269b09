#![forbid(unsafe_code)]

use super::StoreError;
use bdoc_core::PatchResult;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

const MAX_KEY_LEN: usize = 256;

pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::validation("idempotencyKey must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::validation("idempotencyKey is too long"));
    }
    Ok(())
}

/// Result recorded for `(object_id, key)`. Keys are scoped per object.
pub(crate) fn lookup(
    conn: &Connection,
    object_id: &str,
    key: &str,
) -> Result<Option<PatchResult>, StoreError> {
    let raw = conn
        .query_row(
            "SELECT result_json FROM idempotency WHERE object_id=?1 AND key=?2",
            params![object_id, key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn store_tx(
    tx: &Transaction<'_>,
    object_id: &str,
    key: &str,
    result: &PatchResult,
    now_ms: i64,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(result)?;
    tx.execute(
        "INSERT INTO idempotency(object_id, key, result_json, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
        params![object_id, key, raw, now_ms],
    )?;
    Ok(())
}
