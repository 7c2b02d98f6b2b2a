use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: String,
    pub filename: String,
    /// Where the raw upload is stored on disk
    pub location: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Processing,
    Indexed,
    Failed(String),
}

/// A single indexed chunk of a document.
///
/// `seq` values for a document form a contiguous range starting at 0;
/// concatenation in sequence order reconstructs overlapping coverage of
/// the extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: Uuid,
    pub user_id: String,
    pub text: String,
    pub seq: usize,
    pub tokens: usize,
}

impl Chunk {
    /// Deterministic chunk identity, so re-ingestion overwrites instead of
    /// duplicating.
    pub fn id_for(doc_id: &Uuid, seq: usize) -> String {
        format!("{doc_id}__{seq}")
    }
}

/// Join record linking a vector index id back to its chunk/document/user.
/// Exists 1:1 with each vector stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMapping {
    pub vector_id: i64,
    pub chunk_id: String,
    pub doc_id: Uuid,
    pub user_id: String,
}

/// Which retrieval path(s) produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Dense,
    Sparse,
    Both,
}

/// A retrieval candidate before reranking. Query-scoped, never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: String,
    pub doc_id: Uuid,
    /// Merged retrieval score: raw cosine similarity or BM25 score,
    /// whichever path produced it (maximum when both did).
    pub score: f32,
    pub provenance: Provenance,
}

/// A candidate after reranking, with its chunk text resolved.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub chunk_id: String,
    pub doc_id: Uuid,
    pub seq: usize,
    pub text: String,
    /// Final relevance score: cross-encoder output, or the merged
    /// retrieval score when the scorer was unavailable.
    pub score: f32,
}

// ─── API request/response types ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub doc_id: Uuid,
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub query_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Source citation attached to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub doc_id: Uuid,
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub doc_id: Uuid,
    pub filename: String,
    pub status: DocumentStatus,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub user_id: String,
    pub documents: Vec<DocumentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub doc_id: Uuid,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_to_snake_case() {
        let json = serde_json::to_value(DocumentStatus::Queued).unwrap();
        assert_eq!(json, "queued");
        let json = serde_json::to_value(DocumentStatus::Indexed).unwrap();
        assert_eq!(json, "indexed");
    }

    #[test]
    fn test_status_round_trips() {
        let status = DocumentStatus::Failed("extraction failed".to_string());
        let json = serde_json::to_string(&status).unwrap();
        let back: DocumentStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_chunk_id_is_deterministic() {
        let doc_id = Uuid::new_v4();
        assert_eq!(Chunk::id_for(&doc_id, 3), Chunk::id_for(&doc_id, 3));
        assert_ne!(Chunk::id_for(&doc_id, 3), Chunk::id_for(&doc_id, 4));
        assert_eq!(Chunk::id_for(&doc_id, 0), format!("{doc_id}__0"));
    }
}
