#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRow {
    pub id: String,
    pub object_id: String,
    pub parent_block_id: Option<String>,
    pub order_key: String,
    pub block_type: String,
    pub content: Value,
    pub meta: Option<Value>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNode {
    pub id: String,
    pub parent_block_id: Option<String>,
    pub order_key: String,
    pub block_type: String,
    pub content: Value,
    pub meta: Option<Value>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
    pub children: Vec<BlockNode>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub object_id: String,
    pub doc_version: i64,
    pub blocks: Vec<BlockNode>,
}

impl Document {
    /// Depth-first walk over every reachable block.
    pub fn iter(&self) -> impl Iterator<Item = &BlockNode> {
        let mut stack: Vec<&BlockNode> = self.blocks.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    pub fn find(&self, block_id: &str) -> Option<&BlockNode> {
        self.iter().find(|node| node.id == block_id)
    }
}

/// Groups rows by parent and builds the ordered forest from the roots down.
/// Rows whose parent is not in `rows` are never reached.
///
/// Assembly keeps its own stack, so tree depth is bounded by memory and not
/// by the thread stack.
pub fn assemble_forest(rows: Vec<BlockRow>) -> Vec<BlockNode> {
    let mut by_parent: HashMap<Option<String>, Vec<BlockRow>> = HashMap::new();
    for row in rows {
        by_parent.entry(row.parent_block_id.clone()).or_default().push(row);
    }

    let mut roots = take_children(&mut by_parent, None);
    let mut forest = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let next = match stack.last_mut() {
            Some(frame) => frame.pending.pop(),
            None => roots.pop(),
        };
        if let Some(row) = next {
            let pending = take_children(&mut by_parent, Some(row.id.clone()));
            stack.push(Frame {
                row,
                pending,
                built: Vec::new(),
            });
            continue;
        }

        let Some(frame) = stack.pop() else {
            break;
        };
        let node = frame.into_node();
        match stack.last_mut() {
            Some(parent) => parent.built.push(node),
            None => forest.push(node),
        }
    }
    forest
}

/// A row whose children are still being built. `pending` is sorted
/// descending so `pop` yields the next sibling in order.
struct Frame {
    row: BlockRow,
    pending: Vec<BlockRow>,
    built: Vec<BlockNode>,
}

impl Frame {
    fn into_node(self) -> BlockNode {
        let row = self.row;
        BlockNode {
            id: row.id,
            parent_block_id: row.parent_block_id,
            order_key: row.order_key,
            block_type: row.block_type,
            content: row.content,
            meta: row.meta,
            created_at_ms: row.created_at_ms,
            updated_at_ms: row.updated_at_ms,
            deleted_at_ms: row.deleted_at_ms,
            children: self.built,
        }
    }
}

fn take_children(
    by_parent: &mut HashMap<Option<String>, Vec<BlockRow>>,
    parent: Option<String>,
) -> Vec<BlockRow> {
    let mut rows = by_parent.remove(&parent).unwrap_or_default();
    rows.sort_by(|a, b| {
        crate::order_key::compare(&b.order_key, &a.order_key).then_with(|| b.id.cmp(&a.id))
    });
    rows
}
