#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

impl SqliteStore {
    /// Committed-state check: would placing `block_id` under
    /// `proposed_parent` make the block its own ancestor?
    pub fn would_create_cycle(
        &self,
        block_id: &str,
        proposed_parent: Option<&str>,
    ) -> Result<bool, StoreError> {
        let Some(parent_id) = proposed_parent else {
            return Ok(false);
        };
        if parent_id == block_id {
            return Ok(true);
        }
        let chain = parent_chain(&self.conn, parent_id, self.config.max_tree_depth)?;
        Ok(chain.iter().any(|id| id == block_id))
    }

    /// Ancestors of a committed block, immediate parent first.
    pub fn get_ancestors(&self, block_id: &str) -> Result<Vec<String>, StoreError> {
        if super::block_owner(&self.conn, block_id)?.is_none() {
            return Err(StoreError::block_not_found(block_id));
        }
        parent_chain(&self.conn, block_id, self.config.max_tree_depth)
    }
}

/// Walks `parent_block_id` links upward from `start`, excluding `start`.
/// Stops at the root, at a dangling parent, at a revisited block, or after
/// `max_depth` hops.
fn parent_chain(
    conn: &Connection,
    start: &str,
    max_depth: usize,
) -> Result<Vec<String>, StoreError> {
    let mut out = Vec::new();
    let mut seen = HashSet::from([start.to_string()]);
    let mut current = start.to_string();

    loop {
        let parent = conn
            .query_row(
                "SELECT parent_block_id FROM blocks WHERE id=?1",
                params![current],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        let Some(parent) = parent else {
            break;
        };
        if !seen.insert(parent.clone()) {
            tracing::warn!(block_id = start, "parent chain loops back on itself");
            break;
        }
        out.push(parent.clone());
        if out.len() >= max_depth {
            tracing::warn!(block_id = start, max_depth, "parent chain hit depth guard");
            break;
        }
        current = parent;
    }

    Ok(out)
}
