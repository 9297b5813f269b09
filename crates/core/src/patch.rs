#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_doc_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub ops: Vec<PatchOp>,
}

impl PatchRequest {
    pub fn new(object_id: impl Into<String>, ops: Vec<PatchOp>) -> Self {
        Self {
            object_id: object_id.into(),
            base_doc_version: None,
            idempotency_key: None,
            ops,
        }
    }

    pub fn with_base_version(mut self, version: i64) -> Self {
        self.base_doc_version = Some(version);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum PatchOp {
    Insert {
        block_id: String,
        #[serde(default)]
        parent_block_id: Option<String>,
        block_type: String,
        content: Value,
        order_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
    },
    Update {
        block_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
    },
    Move {
        block_id: String,
        #[serde(default)]
        new_parent_block_id: Option<String>,
        new_order_key: String,
    },
    Delete {
        block_id: String,
        #[serde(default)]
        subtree: bool,
    },
}

impl PatchOp {
    pub fn block_id(&self) -> &str {
        match self {
            Self::Insert { block_id, .. }
            | Self::Update { block_id, .. }
            | Self::Move { block_id, .. }
            | Self::Delete { block_id, .. } => block_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Move { .. } => "move",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedChanges {
    pub inserted_block_ids: Vec<String>,
    pub updated_block_ids: Vec<String>,
    pub moved_block_ids: Vec<String>,
    pub deleted_block_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    pub object_id: String,
    pub previous_doc_version: i64,
    pub new_doc_version: i64,
    pub applied: AppliedChanges,
}

/// Appends `id` unless it is already listed; keeps first-seen order.
pub fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}
