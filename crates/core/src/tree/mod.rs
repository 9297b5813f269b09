#![forbid(unsafe_code)]

//! Arena-backed block forest for one object.
//!
//! Blocks live in a flat `Vec`; a parent is an optional index into it. The
//! patch engine loads an object's blocks into a `BlockTree`, replays every op
//! of a batch against it for validation, and only then touches the database,
//! so later ops in a batch see the effects of earlier ones.

use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct TreeNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub order_key: String,
    pub deleted: bool,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct BlockTree {
    nodes: Vec<TreeNode>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
}

/// Row shape accepted by [`BlockTree::from_rows`].
#[derive(Clone, Debug)]
pub struct TreeRow {
    pub id: String,
    pub parent_id: Option<String>,
    pub order_key: String,
    pub deleted: bool,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the forest in two passes so rows may arrive in any order. A
    /// parent id that names no row leaves the block detached (neither a root
    /// nor anyone's child) but still addressable by id.
    pub fn from_rows(rows: impl IntoIterator<Item = TreeRow>) -> Self {
        let mut tree = Self::new();
        for row in rows {
            let slot = tree.nodes.len();
            tree.index.insert(row.id.clone(), slot);
            tree.nodes.push(TreeNode {
                id: row.id,
                parent_id: row.parent_id,
                order_key: row.order_key,
                deleted: row.deleted,
                parent: None,
                children: Vec::new(),
            });
        }
        for slot in 0..tree.nodes.len() {
            let parent = match tree.nodes[slot].parent_id.as_deref() {
                None => {
                    tree.roots.push(slot);
                    continue;
                }
                Some(parent_id) => tree.index.get(parent_id).copied(),
            };
            if let Some(parent) = parent {
                tree.nodes[slot].parent = Some(parent);
                tree.nodes[parent].children.push(slot);
            }
        }
        tree
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.index.get(id).map(|slot| &self.nodes[*slot])
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.get(id).is_some_and(|node| node.deleted)
    }

    /// Adds a block under `parent_id` (which must already be in the tree) or
    /// at root level. Returns `false` if the id is already taken.
    pub fn insert(&mut self, id: &str, parent_id: Option<&str>, order_key: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        let parent = parent_id.and_then(|pid| self.index.get(pid).copied());
        let slot = self.nodes.len();
        self.nodes.push(TreeNode {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            order_key: order_key.to_string(),
            deleted: false,
            parent,
            children: Vec::new(),
        });
        self.index.insert(id.to_string(), slot);
        self.attach(slot, parent_id.is_none());
        true
    }

    /// Re-parents `id` and gives it a new order key. Returns `false` for an
    /// unknown block.
    pub fn relocate(&mut self, id: &str, new_parent_id: Option<&str>, order_key: &str) -> bool {
        let Some(slot) = self.index.get(id).copied() else {
            return false;
        };
        self.detach(slot);
        let parent = new_parent_id.and_then(|pid| self.index.get(pid).copied());
        let node = &mut self.nodes[slot];
        node.parent_id = new_parent_id.map(str::to_string);
        node.parent = parent;
        node.order_key = order_key.to_string();
        self.attach(slot, new_parent_id.is_none());
        true
    }

    /// Marks one block deleted. Returns `true` if it was live before.
    pub fn mark_deleted(&mut self, id: &str) -> bool {
        match self.index.get(id).copied() {
            Some(slot) if !self.nodes[slot].deleted => {
                self.nodes[slot].deleted = true;
                true
            }
            _ => false,
        }
    }

    /// True iff placing `block_id` under `proposed_parent` would make the
    /// block its own ancestor. Soft-delete state does not matter here.
    pub fn would_create_cycle(&self, block_id: &str, proposed_parent: Option<&str>) -> bool {
        let Some(parent_id) = proposed_parent else {
            return false;
        };
        if parent_id == block_id {
            return true;
        }
        let mut current = self.index.get(parent_id).copied();
        let mut seen = HashSet::new();
        while let Some(slot) = current {
            if !seen.insert(slot) {
                tracing::warn!(block_id, "parent chain already loops, refusing reparent");
                return true;
            }
            let node = &self.nodes[slot];
            if node.id == block_id {
                return true;
            }
            current = node.parent;
        }
        false
    }

    /// Immediate parent first, root last.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let Some(start) = self.index.get(id).copied() else {
            return out;
        };
        let mut seen = HashSet::from([start]);
        let mut current = self.nodes[start].parent;
        while let Some(slot) = current {
            if !seen.insert(slot) {
                break;
            }
            out.push(self.nodes[slot].id.clone());
            current = self.nodes[slot].parent;
        }
        out
    }

    /// Every descendant of `id` at any depth, parents before children.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let Some(start) = self.index.get(id).copied() else {
            return out;
        };
        let mut seen = HashSet::from([start]);
        let mut stack: Vec<usize> = self.nodes[start].children.iter().rev().copied().collect();
        while let Some(slot) = stack.pop() {
            if !seen.insert(slot) {
                continue;
            }
            out.push(self.nodes[slot].id.clone());
            stack.extend(self.nodes[slot].children.iter().rev().copied());
        }
        out
    }

    /// Levels hanging below `id`: 0 for a leaf, 1 if it only has children.
    /// Deleted descendants count, since they travel with the subtree.
    pub fn height(&self, id: &str) -> usize {
        let Some(start) = self.index.get(id).copied() else {
            return 0;
        };
        let mut tallest = 0;
        let mut seen = HashSet::from([start]);
        let mut stack = vec![(start, 0)];
        while let Some((slot, level)) = stack.pop() {
            tallest = tallest.max(level);
            for child in &self.nodes[slot].children {
                if seen.insert(*child) {
                    stack.push((*child, level + 1));
                }
            }
        }
        tallest
    }

    /// Whether a live sibling under `parent_id` already holds `order_key`.
    /// `except` excludes the block being moved.
    pub fn sibling_key_taken(
        &self,
        parent_id: Option<&str>,
        order_key: &str,
        except: Option<&str>,
    ) -> bool {
        let siblings: &[usize] = match parent_id {
            None => &self.roots,
            Some(pid) => match self.index.get(pid) {
                Some(slot) => &self.nodes[*slot].children,
                None => return false,
            },
        };
        siblings.iter().any(|slot| {
            let node = &self.nodes[*slot];
            !node.deleted && node.order_key == order_key && Some(node.id.as_str()) != except
        })
    }

    fn attach(&mut self, slot: usize, at_root: bool) {
        match self.nodes[slot].parent {
            Some(parent) => self.nodes[parent].children.push(slot),
            None if at_root => self.roots.push(slot),
            None => {}
        }
    }

    fn detach(&mut self, slot: usize) {
        match self.nodes[slot].parent {
            Some(parent) => self.nodes[parent].children.retain(|child| *child != slot),
            None => self.roots.retain(|root| *root != slot),
        }
    }
}

#[cfg(test)]
mod tests;
