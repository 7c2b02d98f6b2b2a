//! Deletion coordinator: removes a document's data from every store in a
//! fixed order, each step treating "already absent" as success so the
//! whole operation can be reissued after a crash.
//!
//! Order: chunks → vectors → mappings → document record → physical file.
//! A crash mid-way leaves no queryable chunk whose backing stores have
//! already been emptied: once chunks are gone the document is invisible to
//! both retrieval paths (orphaned mappings are skipped defensively at
//! query time), and a re-issued delete finishes the cleanup.

use std::path::Path;

use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;

impl Pipeline {
    /// Remove all data for `doc_id`. Returns true when anything was
    /// removed; an entirely unknown document is still success.
    pub async fn delete_document(&self, doc_id: &Uuid) -> Result<bool, PipelineError> {
        let document = self.store.get_document(doc_id);

        // 1. Chunks out of the metadata store (and lexical index).
        self.store.delete_chunks(doc_id)?;

        // 2. Vectors out of the index, addressed via the mapping table.
        let mappings = self.store.mappings_for_document(doc_id);
        if !mappings.is_empty() {
            let ids: Vec<i64> = mappings.iter().map(|m| m.vector_id).collect();
            self.vectors.remove(&ids)?;
        }

        // 3. Mappings themselves.
        let removed_mappings = self.store.delete_mappings(doc_id)?;

        // 4. Document record.
        let removed_doc = self.store.remove_document(doc_id)?;

        // 5. Physical file, missing tolerated.
        if let Some(doc) = document.as_ref().or(removed_doc.as_ref()) {
            let path = Path::new(&doc.location);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!("Failed to remove file {}: {e}", path.display());
                }
            }
        }

        let removed_anything = removed_doc.is_some() || removed_mappings > 0;
        tracing::info!(
            "Deleted document {doc_id} (record: {}, mappings: {removed_mappings})",
            removed_doc.is_some()
        );
        Ok(removed_anything || document.is_some())
    }
}
