#![forbid(unsafe_code)]

//! SQLite-backed block-document store.
//!
//! Every write runs in one transaction: a patch batch either lands whole,
//! together with its reference and search index rows and the version bump,
//! or not at all.

mod store;

pub use bdoc_core::{AppliedChanges, BlockNode, Document, PatchOp, PatchRequest, PatchResult};
pub use store::*;
