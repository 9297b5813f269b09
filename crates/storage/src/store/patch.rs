#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, idempotency, indexes};
use bdoc_core::content::validate_content_shape;
use bdoc_core::ids::validate_block_type;
use bdoc_core::order_key::validate_order_key;
use bdoc_core::patch::push_unique;
use bdoc_core::{AppliedChanges, BlockTree, PatchOp, PatchRequest, PatchResult, TreeRow};
use rusqlite::{Connection, Transaction, params};
use serde_json::Value;
use std::collections::HashSet;

impl SqliteStore {
    /// Applies a batch of block ops atomically and bumps `doc_version` by one.
    ///
    /// Ops are first replayed against an in-memory tree of the object so
    /// later ops see the effect of earlier ones; the first invalid op fails
    /// the whole batch before anything is written. A replayed idempotency
    /// key returns the stored result without touching the object.
    pub fn apply_patch(&mut self, request: PatchRequest) -> Result<PatchResult, StoreError> {
        let object_id = request.object_id.clone();
        let op_count = request.ops.len();
        let outcome = self.apply_patch_inner(request);
        if let Err(err) = &outcome {
            tracing::warn!(
                object_id = %object_id,
                ops = op_count,
                code = err.code(),
                error = %err,
                "patch rejected"
            );
        }
        outcome
    }

    fn apply_patch_inner(&mut self, request: PatchRequest) -> Result<PatchResult, StoreError> {
        validate_request_shape(&request)?;
        let object_id = request.object_id.as_str();
        let max_depth = self.config.max_tree_depth;

        let tx = self.conn.transaction()?;
        let object = super::live_object(&tx, object_id)?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(cached) = idempotency::lookup(&tx, object_id, key)? {
                tracing::debug!(object_id, key, "idempotent patch replayed");
                return Ok(cached);
            }
        }

        if let Some(expected) = request.base_doc_version {
            if expected != object.doc_version {
                return Err(StoreError::ConflictVersion {
                    expected,
                    actual: object.doc_version,
                });
            }
        }

        let mut tree = load_tree(&tx, object_id)?;
        let affected = plan_ops(&tx, &mut tree, object_id, &request.ops, max_depth)?;

        let now_ms = super::now_ms();
        let mut applied = AppliedChanges::default();
        let mut content_touched: Vec<String> = Vec::new();

        for (op, ids) in request.ops.iter().zip(&affected) {
            match op {
                PatchOp::Insert {
                    block_id,
                    parent_block_id,
                    block_type,
                    content,
                    order_key,
                    meta,
                } => {
                    tx.execute(
                        "INSERT INTO blocks(id, object_id, parent_block_id, order_key, block_type, \
                         content_json, meta_json, created_at_ms, updated_at_ms, deleted_at_ms) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, NULL)",
                        params![
                            block_id,
                            object_id,
                            parent_block_id,
                            order_key,
                            block_type,
                            content,
                            meta,
                            now_ms,
                        ],
                    )?;
                    push_unique(&mut applied.inserted_block_ids, block_id);
                    push_unique(&mut content_touched, block_id);
                }
                PatchOp::Update {
                    block_id,
                    content,
                    meta,
                } => {
                    update_block_tx(&tx, block_id, content.as_ref(), meta.as_ref(), now_ms)?;
                    push_unique(&mut applied.updated_block_ids, block_id);
                    if content.is_some() {
                        push_unique(&mut content_touched, block_id);
                    }
                }
                PatchOp::Move {
                    block_id,
                    new_parent_block_id,
                    new_order_key,
                } => {
                    tx.execute(
                        "UPDATE blocks SET parent_block_id=?2, order_key=?3, updated_at_ms=?4 WHERE id=?1",
                        params![block_id, new_parent_block_id, new_order_key, now_ms],
                    )?;
                    push_unique(&mut applied.moved_block_ids, block_id);
                }
                PatchOp::Delete { .. } => {
                    let mut stmt = tx.prepare_cached(
                        "UPDATE blocks SET deleted_at_ms=?2, updated_at_ms=?2 \
                         WHERE id=?1 AND deleted_at_ms IS NULL",
                    )?;
                    for id in ids {
                        stmt.execute(params![id, now_ms])?;
                        push_unique(&mut applied.deleted_block_ids, id);
                    }
                }
            }
        }

        for block_id in &content_touched {
            if tree.is_deleted(block_id) {
                continue;
            }
            let content = block_content_tx(&tx, block_id)?;
            indexes::reindex_block(&tx, block_id, object_id, &content)?;
        }
        indexes::remove_indexes(&tx, &applied.deleted_block_ids)?;

        let bumped = tx.execute(
            "UPDATE objects SET doc_version = doc_version + 1, updated_at_ms=?3 \
             WHERE id=?1 AND doc_version=?2",
            params![object_id, object.doc_version, now_ms],
        )?;
        if bumped != 1 {
            let actual = super::live_object(&tx, object_id)?.doc_version;
            return Err(StoreError::ConflictVersion {
                expected: object.doc_version,
                actual,
            });
        }

        let result = PatchResult {
            object_id: object_id.to_string(),
            previous_doc_version: object.doc_version,
            new_doc_version: object.doc_version + 1,
            applied,
        };
        if let Some(key) = request.idempotency_key.as_deref() {
            idempotency::store_tx(&tx, object_id, key, &result, now_ms)?;
        }

        tx.commit()?;
        tracing::info!(
            object_id,
            previous_doc_version = result.previous_doc_version,
            new_doc_version = result.new_doc_version,
            ops = request.ops.len(),
            inserted = result.applied.inserted_block_ids.len(),
            updated = result.applied.updated_block_ids.len(),
            moved = result.applied.moved_block_ids.len(),
            deleted = result.applied.deleted_block_ids.len(),
            "patch applied"
        );
        Ok(result)
    }
}

fn validate_request_shape(request: &PatchRequest) -> Result<(), StoreError> {
    super::canonicalize_object(&request.object_id)?;
    if let Some(key) = request.idempotency_key.as_deref() {
        idempotency::validate_key(key)?;
    }
    if request.base_doc_version.is_some_and(|version| version < 0) {
        return Err(StoreError::validation("baseDocVersion must not be negative"));
    }

    let mut inserted = HashSet::new();
    for op in &request.ops {
        super::canonicalize_block(op.block_id())?;
        match op {
            PatchOp::Insert {
                block_id,
                parent_block_id,
                block_type,
                content,
                order_key,
                meta,
            } => {
                if let Some(parent) = parent_block_id.as_deref() {
                    super::canonicalize_block(parent)?;
                }
                validate_block_type(block_type)
                    .map_err(|err| StoreError::validation(err.message()))?;
                check_order_key(order_key)?;
                check_content(content)?;
                if let Some(meta) = meta {
                    super::check_json_depth("meta", meta)?;
                }
                if !inserted.insert(block_id.as_str()) {
                    return Err(StoreError::validation(format!(
                        "block {block_id} is inserted twice in one patch"
                    )));
                }
            }
            PatchOp::Update { content, meta, .. } => {
                if content.is_none() && meta.is_none() {
                    return Err(StoreError::validation(
                        "update requires content or meta",
                    ));
                }
                if let Some(content) = content {
                    check_content(content)?;
                }
                if let Some(meta) = meta {
                    super::check_json_depth("meta", meta)?;
                }
            }
            PatchOp::Move {
                new_parent_block_id,
                new_order_key,
                ..
            } => {
                if let Some(parent) = new_parent_block_id.as_deref() {
                    super::canonicalize_block(parent)?;
                }
                check_order_key(new_order_key)?;
            }
            PatchOp::Delete { .. } => {}
        }
    }
    Ok(())
}

fn check_order_key(key: &str) -> Result<(), StoreError> {
    validate_order_key(key).map_err(|err| StoreError::validation(err.message()))
}

fn check_content(content: &Value) -> Result<(), StoreError> {
    validate_content_shape(content).map_err(|err| StoreError::validation(err.message()))
}

fn load_tree(conn: &Connection, object_id: &str) -> Result<BlockTree, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_block_id, order_key, deleted_at_ms IS NOT NULL \
         FROM blocks WHERE object_id=?1",
    )?;
    let rows = stmt.query_map(params![object_id], |row| {
        Ok(TreeRow {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            order_key: row.get(2)?,
            deleted: row.get(3)?,
        })
    })?;
    let rows = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(BlockTree::from_rows(rows))
}

/// Replays `ops` against `tree`, returning for each op the block ids it
/// touches. Nothing is written.
fn plan_ops(
    conn: &Connection,
    tree: &mut BlockTree,
    object_id: &str,
    ops: &[PatchOp],
    max_depth: usize,
) -> Result<Vec<Vec<String>>, StoreError> {
    let mut affected = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            PatchOp::Insert {
                block_id,
                parent_block_id,
                order_key,
                ..
            } => {
                if tree.contains(block_id) || super::block_owner(conn, block_id)?.is_some() {
                    return Err(StoreError::validation(format!(
                        "block {block_id} already exists"
                    )));
                }
                let parent = parent_block_id.as_deref();
                if let Some(parent) = parent {
                    resolve_parent(conn, tree, object_id, parent)?;
                }
                check_depth(tree, block_id, parent, 0, max_depth)?;
                check_sibling_key(tree, parent, order_key, None)?;
                tree.insert(block_id, parent, order_key);
                affected.push(vec![block_id.clone()]);
            }
            PatchOp::Update { block_id, .. } => {
                resolve_target(conn, tree, object_id, block_id, false)?;
                affected.push(vec![block_id.clone()]);
            }
            PatchOp::Move {
                block_id,
                new_parent_block_id,
                new_order_key,
            } => {
                resolve_target(conn, tree, object_id, block_id, false)?;
                let parent = new_parent_block_id.as_deref();
                if let Some(parent) = parent {
                    resolve_parent(conn, tree, object_id, parent)?;
                    if tree.would_create_cycle(block_id, Some(parent)) {
                        return Err(StoreError::InvariantCycle {
                            block_id: block_id.clone(),
                            would_be_under: parent.to_string(),
                        });
                    }
                }
                check_depth(tree, block_id, parent, tree.height(block_id), max_depth)?;
                check_sibling_key(tree, parent, new_order_key, Some(block_id))?;
                tree.relocate(block_id, parent, new_order_key);
                affected.push(vec![block_id.clone()]);
            }
            PatchOp::Delete { block_id, subtree } => {
                resolve_target(conn, tree, object_id, block_id, true)?;
                let mut ids = vec![block_id.clone()];
                if *subtree {
                    ids.extend(tree.descendants(block_id));
                }
                for id in &ids {
                    tree.mark_deleted(id);
                }
                affected.push(ids);
            }
        }
    }
    Ok(affected)
}

/// Op target must belong to the object; soft-deleted targets are only
/// accepted when `allow_deleted` is set.
fn resolve_target(
    conn: &Connection,
    tree: &BlockTree,
    object_id: &str,
    block_id: &str,
    allow_deleted: bool,
) -> Result<(), StoreError> {
    match tree.get(block_id) {
        Some(node) if node.deleted && !allow_deleted => Err(StoreError::block_not_found(block_id)),
        Some(_) => Ok(()),
        None => match super::block_owner(conn, block_id)? {
            Some(owner) => Err(StoreError::InvariantCrossObject {
                block_object_id: owner,
                parent_object_id: object_id.to_string(),
            }),
            None => Err(StoreError::block_not_found(block_id)),
        },
    }
}

fn resolve_parent(
    conn: &Connection,
    tree: &BlockTree,
    object_id: &str,
    parent_id: &str,
) -> Result<(), StoreError> {
    match tree.get(parent_id) {
        Some(node) if node.deleted => Err(StoreError::InvariantParentDeleted {
            parent_block_id: parent_id.to_string(),
        }),
        Some(_) => Ok(()),
        None => match super::block_owner(conn, parent_id)? {
            Some(owner) => Err(StoreError::InvariantCrossObject {
                block_object_id: object_id.to_string(),
                parent_object_id: owner,
            }),
            None => Err(StoreError::block_not_found(parent_id)),
        },
    }
}

/// `subtree_height` is how many levels hang below `block_id`; they move
/// with it.
fn check_depth(
    tree: &BlockTree,
    block_id: &str,
    parent: Option<&str>,
    subtree_height: usize,
    max_depth: usize,
) -> Result<(), StoreError> {
    let depth = match parent {
        Some(parent) => tree.ancestors(parent).len() + 2 + subtree_height,
        None => 1 + subtree_height,
    };
    if depth > max_depth {
        tracing::warn!(block_id, depth, max_depth, "block placement hit depth guard");
        return Err(StoreError::validation(format!(
            "placing block {block_id} would nest deeper than {max_depth} levels"
        )));
    }
    Ok(())
}

fn check_sibling_key(
    tree: &BlockTree,
    parent: Option<&str>,
    order_key: &str,
    except: Option<&str>,
) -> Result<(), StoreError> {
    if tree.sibling_key_taken(parent, order_key, except) {
        return Err(StoreError::ConflictOrdering {
            order_key: order_key.to_string(),
            parent_block_id: parent.map(str::to_string),
        });
    }
    Ok(())
}

fn update_block_tx(
    tx: &Transaction<'_>,
    block_id: &str,
    content: Option<&Value>,
    meta: Option<&Value>,
    now_ms: i64,
) -> Result<(), StoreError> {
    if let Some(content) = content {
        tx.execute(
            "UPDATE blocks SET content_json=?2, updated_at_ms=?3 WHERE id=?1",
            params![block_id, content, now_ms],
        )?;
    }
    if let Some(meta) = meta {
        tx.execute(
            "UPDATE blocks SET meta_json=?2, updated_at_ms=?3 WHERE id=?1",
            params![block_id, meta, now_ms],
        )?;
    }
    Ok(())
}

fn block_content_tx(tx: &Transaction<'_>, block_id: &str) -> Result<Value, StoreError> {
    Ok(tx.query_row(
        "SELECT content_json FROM blocks WHERE id=?1",
        params![block_id],
        |row| row.get::<_, Value>(0),
    )?)
}
