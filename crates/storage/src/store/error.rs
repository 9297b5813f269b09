#![forbid(unsafe_code)]

use thiserror::Error;

/// Every failure is terminal for the call that produced it; the enclosing
/// transaction has already been rolled back when a caller sees one.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("object not found: {object_id}")]
    NotFoundObject { object_id: String },

    #[error("block not found: {block_id}")]
    NotFoundBlock { block_id: String },

    #[error("doc version mismatch (expected={expected}, actual={actual})")]
    ConflictVersion { expected: i64, actual: i64 },

    #[error("order key {order_key:?} already taken (parent={parent_block_id:?})")]
    ConflictOrdering {
        order_key: String,
        parent_block_id: Option<String>,
    },

    #[error("block {block_id} cannot move under its own descendant {would_be_under}")]
    InvariantCycle {
        block_id: String,
        would_be_under: String,
    },

    #[error("cross-object placement (block_object={block_object_id}, parent_object={parent_object_id})")]
    InvariantCrossObject {
        block_object_id: String,
        parent_object_id: String,
    },

    #[error("parent block {parent_block_id} is deleted")]
    InvariantParentDeleted { parent_block_id: String },

    #[error("objects of singleton type {type_key} cannot be duplicated")]
    InvariantSingletonType { type_key: String },

    #[error("internal: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(message) if message.starts_with("RESET_REQUIRED") => "RESET_REQUIRED",
            Self::Validation(_) => "VALIDATION",
            Self::NotFoundObject { .. } => "NOT_FOUND_OBJECT",
            Self::NotFoundBlock { .. } => "NOT_FOUND_BLOCK",
            Self::ConflictVersion { .. } => "CONFLICT_VERSION",
            Self::ConflictOrdering { .. } => "CONFLICT_ORDERING",
            Self::InvariantCycle { .. } => "INVARIANT_CYCLE",
            Self::InvariantCrossObject { .. } => "INVARIANT_CROSS_OBJECT",
            Self::InvariantParentDeleted { .. } => "INVARIANT_PARENT_DELETED",
            Self::InvariantSingletonType { .. } => "INVARIANT_SINGLETON_TYPE",
            Self::Io(_) | Self::Sql(_) | Self::Json(_) | Self::Internal(_) => "INTERNAL",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn object_not_found(object_id: &str) -> Self {
        Self::NotFoundObject {
            object_id: object_id.to_string(),
        }
    }

    pub(crate) fn block_not_found(block_id: &str) -> Self {
        Self::NotFoundBlock {
            block_id: block_id.to_string(),
        }
    }
}
