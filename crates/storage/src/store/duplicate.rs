#![forbid(unsafe_code)]

use super::objects::{insert_object_tx, object_type_by_id};
use super::{DuplicateResult, ObjectRow, SqliteStore, StoreError, indexes};
use bdoc_core::content::remap_refs;
use bdoc_core::generate_id;
use rusqlite::params;
use std::collections::HashMap;

const COPY_SUFFIX: &str = " (copy)";

impl SqliteStore {
    /// Deep-copies an object and every block it owns, soft-deleted ones
    /// included. References into the source object are rewritten to the
    /// copy; references elsewhere are kept as they are.
    pub fn duplicate_object(&mut self, object_id: &str) -> Result<DuplicateResult, StoreError> {
        let object_id = super::canonicalize_object(object_id)?;
        let tx = self.conn.transaction()?;
        let source = super::live_object(&tx, &object_id)?;

        let object_type = object_type_by_id(&tx, &source.type_id)?.ok_or_else(|| {
            StoreError::Internal(format!("object {object_id} has unknown type {}", source.type_id))
        })?;
        if self.config.is_singleton_type(&object_type.key) {
            return Err(StoreError::InvariantSingletonType {
                type_key: object_type.key,
            });
        }

        // Clones may be written before their parents.
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;

        let now_ms = super::now_ms();
        let copy = ObjectRow {
            id: generate_id(),
            type_id: source.type_id.clone(),
            title: format!("{}{COPY_SUFFIX}", source.title),
            properties: source.properties.clone(),
            doc_version: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            deleted_at_ms: None,
        };
        insert_object_tx(&tx, &copy)?;

        let blocks = super::load_block_rows(&tx, &source.id, true)?;
        let new_ids: Vec<String> = blocks.iter().map(|_| generate_id()).collect();
        let id_map: HashMap<String, String> = blocks
            .iter()
            .map(|block| block.id.clone())
            .zip(new_ids.iter().cloned())
            .collect();

        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO blocks(id, object_id, parent_block_id, order_key, block_type, \
                 content_json, meta_json, created_at_ms, updated_at_ms, deleted_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)",
            )?;
            for (block, new_id) in blocks.iter().zip(&new_ids) {
                let parent = match block.parent_block_id.as_deref() {
                    Some(parent) => Some(id_map.get(parent).ok_or_else(|| {
                        StoreError::Internal(format!(
                            "block {} has a parent outside object {}",
                            block.id, source.id
                        ))
                    })?),
                    None => None,
                };
                let content = remap_refs(&block.content, &source.id, &copy.id, &id_map);
                insert.execute(params![
                    new_id,
                    copy.id,
                    parent,
                    block.order_key,
                    block.block_type,
                    content,
                    block.meta,
                    now_ms,
                    block.deleted_at_ms,
                ])?;
                if block.deleted_at_ms.is_none() {
                    indexes::reindex_block(&tx, new_id, &copy.id, &content)?;
                }
            }
        }

        tx.commit()?;
        tracing::info!(
            source_object_id = %source.id,
            object_id = %copy.id,
            blocks = blocks.len(),
            "object duplicated"
        );
        Ok(DuplicateResult {
            object: copy,
            block_count: blocks.len(),
        })
    }
}
