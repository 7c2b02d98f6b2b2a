//! End-to-end pipeline tests over real stores in a temp directory, with
//! deterministic in-process stand-ins for the embedding, generation, and
//! scoring providers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use rag_workspace::config::{ChunkingConfig, RetrievalConfig};
use rag_workspace::error::PipelineError;
use rag_workspace::index::metadata::MetadataStore;
use rag_workspace::index::vector::VectorIndex;
use rag_workspace::llm::{CrossEncoder, EmbeddingProvider, GenerationProvider};
use rag_workspace::models::{Document, DocumentStatus};
use rag_workspace::pipeline::Pipeline;

const DIM: usize = 8;

/// FNV-ish hash of the text, spread over the vector, so embeddings are
/// deterministic and distinct per chunk.
fn fake_embedding(text: &str) -> Vec<f32> {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in text.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (0..DIM)
        .map(|i| (((h >> ((i * 7) % 56)) & 0xff) as f32) / 255.0 + 0.01)
        .collect()
}

struct MockEmbedder {
    fail_all: bool,
    /// Fail on the Nth call (0-based); None means never.
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn working() -> Self {
        Self { fail_all: false, fail_on_call: None, calls: AtomicUsize::new(0) }
    }

    fn failing() -> Self {
        Self { fail_all: true, fail_on_call: None, calls: AtomicUsize::new(0) }
    }

    fn failing_on_call(n: usize) -> Self {
        Self { fail_all: false, fail_on_call: Some(n), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || self.fail_on_call == Some(call) {
            return Err(PipelineError::Embedding("connection refused".to_string()));
        }
        Ok(texts.iter().map(|t| fake_embedding(t)).collect())
    }
}

struct MockGenerator;

#[async_trait]
impl GenerationProvider for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        assert!(prompt.contains("QUESTION:"));
        Ok("generated answer".to_string())
    }
}

struct MockScorer {
    fail: bool,
}

#[async_trait]
impl CrossEncoder for MockScorer {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, PipelineError> {
        if self.fail {
            return Err(PipelineError::Rerank("sidecar down".to_string()));
        }
        let query_words: HashSet<&str> = query.split_whitespace().collect();
        Ok(documents
            .iter()
            .map(|d| {
                d.split_whitespace()
                    .filter(|w| query_words.contains(w))
                    .count() as f32
            })
            .collect())
    }
}

struct TestHarness {
    _dir: tempfile::TempDir,
    store: Arc<MetadataStore>,
    vectors: Arc<VectorIndex>,
    uploads: std::path::PathBuf,
}

impl TestHarness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MetadataStore::open_or_create(&dir.path().join("store.json"), &dir.path().join("index"))
                .unwrap(),
        );
        let vectors = Arc::new(VectorIndex::open_or_create(&dir.path().join("vectors"), DIM).unwrap());
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        Self { _dir: dir, store, vectors, uploads }
    }

    fn pipeline(&self, embedder: MockEmbedder, scorer: MockScorer) -> Pipeline {
        Pipeline {
            store: self.store.clone(),
            vectors: self.vectors.clone(),
            embedder: Arc::new(embedder),
            generator: Arc::new(MockGenerator),
            scorer: Arc::new(scorer),
            // Small windows so short fixtures produce several chunks.
            chunking: ChunkingConfig { window: 10, stride: 2 },
            retrieval: RetrievalConfig {
                k_dense: 10,
                k_sparse: 10,
                top_n: 3,
                context_token_budget: 200,
            },
        }
    }

    /// Write `text` to the uploads directory and register a queued document.
    fn add_document(&self, user_id: &str, filename: &str, text: &str) -> Uuid {
        let doc_id = Uuid::new_v4();
        let location = self.uploads.join(format!("{}.txt", doc_id.simple()));
        std::fs::write(&location, text).unwrap();
        self.store
            .insert_document(Document {
                id: doc_id,
                user_id: user_id.to_string(),
                filename: filename.to_string(),
                location: location.to_string_lossy().to_string(),
                status: DocumentStatus::Queued,
                uploaded_at: chrono::Utc::now(),
                indexed_at: None,
                chunk_count: 0,
            })
            .unwrap();
        doc_id
    }
}

fn words(n: usize, prefix: &str) -> String {
    (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

#[tokio::test]
async fn test_ingest_then_query_returns_cited_answer() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    let text = format!(
        "the onboarding checklist covers laptops badges and payroll {}",
        words(24, "filler")
    );
    let doc_id = harness.add_document("alice", "onboarding.txt", &text);
    pipeline.ingest_document(doc_id).await.unwrap();

    let document = harness.store.get_document(&doc_id).unwrap();
    assert_eq!(document.status, DocumentStatus::Indexed);
    assert!(document.indexed_at.is_some());
    assert!(document.chunk_count > 1);
    // Every indexed chunk has exactly one vector and one mapping.
    assert_eq!(harness.store.mapping_count(&doc_id), document.chunk_count);
    assert_eq!(harness.vectors.len(), document.chunk_count);

    let response = pipeline.answer("alice", "onboarding checklist payroll").await.unwrap();
    assert_eq!(response.answer, "generated answer");
    assert!(!response.sources.is_empty());
    assert!(response.sources.len() <= 3);
    assert!(response.sources.iter().all(|s| s.doc_id == doc_id));
    // The chunk naming the query terms outranks pure filler.
    assert!(response.sources[0].chunk_id.ends_with("__0"));
}

#[tokio::test]
async fn test_failed_embedding_rolls_back_all_vectors() {
    let harness = TestHarness::new();
    // First 32-chunk batch succeeds, second fails partway through the doc.
    let pipeline = harness.pipeline(MockEmbedder::failing_on_call(1), MockScorer { fail: false });

    // 320 tokens, window 10, advance 8 -> 40 chunks -> two embed batches.
    let doc_id = harness.add_document("alice", "big.txt", &words(320, "tok"));
    let err = pipeline.ingest_document(doc_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));

    let document = harness.store.get_document(&doc_id).unwrap();
    assert!(matches!(document.status, DocumentStatus::Failed(_)));
    // The first batch's vectors and mappings were rolled back too.
    assert!(harness.vectors.is_empty());
    assert_eq!(harness.store.mapping_count(&doc_id), 0);
}

#[tokio::test]
async fn test_unsupported_format_marks_failed() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    let doc_id = Uuid::new_v4();
    let location = harness.uploads.join(format!("{}.pdf", doc_id.simple()));
    std::fs::write(&location, b"%PDF-1.4").unwrap();
    harness
        .store
        .insert_document(Document {
            id: doc_id,
            user_id: "alice".to_string(),
            filename: "report.pdf".to_string(),
            location: location.to_string_lossy().to_string(),
            status: DocumentStatus::Queued,
            uploaded_at: chrono::Utc::now(),
            indexed_at: None,
            chunk_count: 0,
        })
        .unwrap();

    let err = pipeline.ingest_document(doc_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    let document = harness.store.get_document(&doc_id).unwrap();
    assert!(matches!(document.status, DocumentStatus::Failed(_)));
}

#[tokio::test]
async fn test_empty_document_marks_failed() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    let doc_id = harness.add_document("alice", "blank.txt", "   \n\t  ");
    let err = pipeline.ingest_document(doc_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDocument));
    assert!(matches!(
        harness.store.get_document(&doc_id).unwrap().status,
        DocumentStatus::Failed(_)
    ));
}

#[tokio::test]
async fn test_deletion_removes_everything_and_repeats_safely() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    let doc_id = harness.add_document("alice", "notes.txt", &words(30, "note"));
    pipeline.ingest_document(doc_id).await.unwrap();
    let location = harness.store.get_document(&doc_id).unwrap().location;
    assert!(std::path::Path::new(&location).exists());

    assert!(pipeline.delete_document(&doc_id).await.unwrap());
    assert!(harness.store.get_document(&doc_id).is_none());
    assert_eq!(harness.store.chunk_count(&doc_id), 0);
    assert_eq!(harness.store.mapping_count(&doc_id), 0);
    assert!(harness.vectors.is_empty());
    assert!(!std::path::Path::new(&location).exists());

    // Second and third deletes are no-ops, not errors.
    assert!(!pipeline.delete_document(&doc_id).await.unwrap());
    assert!(!pipeline.delete_document(&doc_id).await.unwrap());
}

#[tokio::test]
async fn test_deleting_queued_document_succeeds() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    let doc_id = harness.add_document("alice", "pending.txt", "never ingested");
    assert!(pipeline.delete_document(&doc_id).await.unwrap());
    assert!(harness.store.get_document(&doc_id).is_none());
}

#[tokio::test]
async fn test_query_degrades_to_sparse_when_embedder_is_down() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });
    let doc_id = harness.add_document(
        "alice",
        "kb.txt",
        &format!("the deployment runbook mentions kubernetes {}", words(24, "pad")),
    );
    pipeline.ingest_document(doc_id).await.unwrap();

    // Same stores, embedder now unreachable: the lexical path still answers.
    let degraded = harness.pipeline(MockEmbedder::failing(), MockScorer { fail: false });
    let response = degraded.answer("alice", "kubernetes runbook").await.unwrap();
    assert_eq!(response.answer, "generated answer");
    assert!(!response.sources.is_empty());
}

#[tokio::test]
async fn test_scorer_failure_falls_back_to_retrieval_order() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: true });
    let doc_id = harness.add_document(
        "alice",
        "kb.txt",
        &format!("expense reports are filed monthly {}", words(24, "pad")),
    );
    pipeline.ingest_document(doc_id).await.unwrap();

    // Reranker down is never a query failure.
    let response = pipeline.answer("alice", "expense reports").await.unwrap();
    assert_eq!(response.answer, "generated answer");
    assert!(!response.sources.is_empty());
}

#[tokio::test]
async fn test_users_cannot_see_each_others_documents() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });
    let doc_id = harness.add_document(
        "alice",
        "salary.txt",
        &format!("confidential salary bands for engineering {}", words(24, "pad")),
    );
    pipeline.ingest_document(doc_id).await.unwrap();

    let response = pipeline.answer("bob", "salary bands").await.unwrap();
    assert!(response.sources.is_empty());
    assert_ne!(response.answer, "generated answer");

    let alice = pipeline.answer("alice", "salary bands").await.unwrap();
    assert!(!alice.sources.is_empty());
}

#[tokio::test]
async fn test_no_matching_content_answers_without_generation() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    // Nothing ingested at all: no candidates, canned answer, no sources.
    let response = pipeline.answer("alice", "anything at all").await.unwrap();
    assert!(response.sources.is_empty());
    assert_ne!(response.answer, "generated answer");
}

#[tokio::test]
async fn test_reingesting_a_document_overwrites_not_duplicates() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(MockEmbedder::working(), MockScorer { fail: false });

    let doc_id = harness.add_document("alice", "draft.txt", &words(30, "v1word"));
    pipeline.ingest_document(doc_id).await.unwrap();
    let first_count = harness.store.get_document(&doc_id).unwrap().chunk_count;

    // Replace the file contents and run the job again (at-least-once delivery).
    let location = harness.store.get_document(&doc_id).unwrap().location;
    std::fs::write(&location, words(14, "v2word")).unwrap();
    pipeline.ingest_document(doc_id).await.unwrap();

    let document = harness.store.get_document(&doc_id).unwrap();
    assert!(document.chunk_count < first_count);
    assert_eq!(harness.store.chunk_count(&doc_id), document.chunk_count);
    assert_eq!(harness.store.mapping_count(&doc_id), document.chunk_count);
}
