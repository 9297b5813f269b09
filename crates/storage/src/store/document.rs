#![forbid(unsafe_code)]

use super::{GetDocumentOptions, SqliteStore, StoreError};
use bdoc_core::Document;
use bdoc_core::document::assemble_forest;

impl SqliteStore {
    /// Ordered block forest of a live object. Blocks whose parent is not part
    /// of the loaded set (a live child of a deleted parent when deleted rows
    /// are excluded) are not reachable from any root and are left out.
    pub fn get_document(
        &self,
        object_id: &str,
        options: GetDocumentOptions,
    ) -> Result<Document, StoreError> {
        let object = super::live_object(&self.conn, object_id)?;
        let rows = super::load_block_rows(&self.conn, &object.id, options.include_deleted)?;
        let row_count = rows.len();

        let document = Document {
            object_id: object.id,
            doc_version: object.doc_version,
            blocks: assemble_forest(rows),
        };
        tracing::debug!(
            object_id = %document.object_id,
            doc_version = document.doc_version,
            rows = row_count,
            include_deleted = options.include_deleted,
            "document assembled"
        );
        Ok(document)
    }
}
