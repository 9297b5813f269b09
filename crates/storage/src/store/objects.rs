#![forbid(unsafe_code)]

use super::{
    CreateObjectRequest, ObjectRow, ObjectTypeRow, OBJECT_COLUMNS, SqliteStore, StoreError,
};
use bdoc_core::{TypeId, generate_id};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;

const MAX_TYPE_KEY_LEN: usize = 64;

impl SqliteStore {
    pub fn create_object_type(&mut self, key: &str, name: &str) -> Result<ObjectTypeRow, StoreError> {
        let key = canonicalize_type_key(key)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("object type name must not be empty"));
        }

        let row = ObjectTypeRow {
            id: generate_id(),
            key,
            name: name.to_string(),
            created_at_ms: super::now_ms(),
        };

        let tx = self.conn.transaction()?;
        let insert = tx.execute(
            "INSERT INTO object_types(id, key, name, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![row.id, row.key, row.name, row.created_at_ms],
        );
        if let Err(err) = insert {
            if super::is_constraint_violation(&err) {
                return Err(StoreError::validation(format!(
                    "object type key {:?} already exists",
                    row.key
                )));
            }
            return Err(err.into());
        }
        tx.commit()?;
        Ok(row)
    }

    pub fn get_object_type(&self, type_id: &str) -> Result<Option<ObjectTypeRow>, StoreError> {
        object_type_by_id(&self.conn, type_id)
    }

    pub fn create_object(&mut self, request: CreateObjectRequest) -> Result<ObjectRow, StoreError> {
        let type_id = TypeId::try_new(request.type_id)
            .map_err(|err| StoreError::validation(err.message()))?
            .into_string();
        let properties = request
            .properties
            .unwrap_or_else(|| Value::Object(Default::default()));
        if !properties.is_object() {
            return Err(StoreError::validation("properties must be a JSON object"));
        }
        super::check_json_depth("properties", &properties)?;

        let tx = self.conn.transaction()?;
        if object_type_by_id(&tx, &type_id)?.is_none() {
            return Err(StoreError::validation(format!(
                "unknown object type {type_id}"
            )));
        }

        let now_ms = super::now_ms();
        let object = ObjectRow {
            id: generate_id(),
            type_id,
            title: request.title,
            properties,
            doc_version: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            deleted_at_ms: None,
        };
        insert_object_tx(&tx, &object)?;
        tx.commit()?;

        tracing::debug!(object_id = %object.id, type_id = %object.type_id, "object created");
        Ok(object)
    }

    /// Live objects only; a soft-deleted object reads as absent.
    pub fn get_object(&self, object_id: &str) -> Result<Option<ObjectRow>, StoreError> {
        match super::live_object(&self.conn, object_id) {
            Ok(object) => Ok(Some(object)),
            Err(StoreError::NotFoundObject { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Soft-deletes the object and drops every derived index row of its
    /// blocks. Blocks themselves are left untouched.
    pub fn delete_object(&mut self, object_id: &str) -> Result<(), StoreError> {
        let object_id = super::canonicalize_object(object_id)?;
        let tx = self.conn.transaction()?;
        super::live_object(&tx, &object_id)?;

        let now_ms = super::now_ms();
        tx.execute(
            "UPDATE objects SET deleted_at_ms=?2, updated_at_ms=?2 WHERE id=?1",
            params![object_id, now_ms],
        )?;

        let block_ids = {
            let mut stmt = tx.prepare("SELECT id FROM blocks WHERE object_id=?1")?;
            let rows = stmt.query_map(params![object_id], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        super::indexes::remove_indexes(&tx, &block_ids)?;

        tx.commit()?;
        tracing::info!(object_id = %object_id, blocks = block_ids.len(), "object deleted");
        Ok(())
    }
}

pub(crate) fn object_type_by_id(
    conn: &Connection,
    type_id: &str,
) -> Result<Option<ObjectTypeRow>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, key, name, created_at_ms FROM object_types WHERE id=?1",
            params![type_id],
            |row| {
                Ok(ObjectTypeRow {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    name: row.get(2)?,
                    created_at_ms: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub(crate) fn insert_object_tx(tx: &Transaction<'_>, object: &ObjectRow) -> Result<(), StoreError> {
    tx.execute(
        &format!(
            "INSERT INTO objects({OBJECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            object.id,
            object.type_id,
            object.title,
            object.properties,
            object.doc_version,
            object.created_at_ms,
            object.updated_at_ms,
            object.deleted_at_ms,
        ],
    )?;
    Ok(())
}

fn canonicalize_type_key(value: &str) -> Result<String, StoreError> {
    let valid = !value.is_empty()
        && value.len() <= MAX_TYPE_KEY_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if !valid {
        return Err(StoreError::validation(
            "object type key must be 1-64 chars of [a-z0-9_-]",
        ));
    }
    Ok(value.to_string())
}
