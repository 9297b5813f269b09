#![forbid(unsafe_code)]

pub mod content;
pub mod document;
pub mod ids;
pub mod order_key;
pub mod patch;
pub mod tree;

pub use content::RefTarget;
pub use document::{BlockNode, BlockRow, Document};
pub use ids::{BlockId, ObjectId, TypeId, generate_id};
pub use patch::{AppliedChanges, PatchOp, PatchRequest, PatchResult};
pub use tree::{BlockTree, TreeRow};
