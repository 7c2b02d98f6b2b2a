//! Document/chunk/mapping store with tantivy-backed lexical search.
//!
//! Records live in memory behind a RwLock and are persisted as a single
//! JSON snapshot (atomic write via temp file + rename); chunk text is
//! additionally indexed in a tantivy directory for BM25 search. The store
//! is deliberately dumb about pipeline semantics: every mutation here is
//! safe to repeat, and the ingestion/deletion coordinators own ordering.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, TantivyDocument};
use uuid::Uuid;

use crate::models::{Chunk, Document, DocumentStatus, VectorMapping};

#[derive(Default, Serialize, Deserialize)]
struct PersistedStore {
    documents: Vec<Document>,
    chunks: HashMap<String, Chunk>,
    mappings: HashMap<i64, VectorMapping>,
}

pub struct MetadataStore {
    documents: RwLock<Vec<Document>>,
    chunks: RwLock<HashMap<String, Chunk>>,
    mappings: RwLock<HashMap<i64, VectorMapping>>,
    db_path: PathBuf,

    index: Index,
    // tantivy allows a single writer; serialize write batches
    writer_lock: Mutex<()>,
    f_chunk_id: Field,
    f_doc_id: Field,
    f_user_id: Field,
    f_text: Field,
}

impl MetadataStore {
    /// Open or create the store: JSON snapshot at `db_path`, tantivy index
    /// under `index_dir`.
    pub fn open_or_create(db_path: &Path, index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted: PersistedStore = if db_path.exists() {
            let data = std::fs::read_to_string(db_path).context("Failed to read store")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            PersistedStore::default()
        };

        let mut schema_builder = Schema::builder();
        let f_chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
        let f_doc_id = schema_builder.add_text_field("doc_id", STRING | STORED);
        let f_user_id = schema_builder.add_text_field("user_id", STRING | STORED);
        let f_text = schema_builder.add_text_field("text", TEXT);
        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            documents: RwLock::new(persisted.documents),
            chunks: RwLock::new(persisted.chunks),
            mappings: RwLock::new(persisted.mappings),
            db_path: db_path.to_path_buf(),
            index,
            writer_lock: Mutex::new(()),
            f_chunk_id,
            f_doc_id,
            f_user_id,
            f_text,
        })
    }

    // ─── Documents ───────────────────────────────────────

    pub fn insert_document(&self, document: Document) -> Result<()> {
        {
            let mut documents = self.documents.write();
            documents.retain(|d| d.id != document.id);
            documents.push(document);
        }
        self.persist()
    }

    pub fn get_document(&self, doc_id: &Uuid) -> Option<Document> {
        self.documents.read().iter().find(|d| &d.id == doc_id).cloned()
    }

    pub fn list_documents(&self, user_id: &str) -> Vec<Document> {
        self.documents
            .read()
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Update a document's status. Returns false for an unknown id.
    pub fn set_status(&self, doc_id: &Uuid, status: DocumentStatus) -> Result<bool> {
        let found = {
            let mut documents = self.documents.write();
            match documents.iter_mut().find(|d| &d.id == doc_id) {
                Some(d) => {
                    d.status = status;
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist()?;
        }
        Ok(found)
    }

    /// Transition a document to `indexed` and record its chunk count.
    pub fn mark_indexed(&self, doc_id: &Uuid, chunk_count: usize) -> Result<bool> {
        let found = {
            let mut documents = self.documents.write();
            match documents.iter_mut().find(|d| &d.id == doc_id) {
                Some(d) => {
                    d.status = DocumentStatus::Indexed;
                    d.indexed_at = Some(chrono::Utc::now());
                    d.chunk_count = chunk_count;
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist()?;
        }
        Ok(found)
    }

    /// Remove the document record, returning it if it existed. Absent is
    /// not an error.
    pub fn remove_document(&self, doc_id: &Uuid) -> Result<Option<Document>> {
        let removed = {
            let mut documents = self.documents.write();
            let pos = documents.iter().position(|d| &d.id == doc_id);
            pos.map(|i| documents.remove(i))
        };
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    // ─── Chunks ──────────────────────────────────────────

    /// Replace a document's chunks with `chunks`, in the record store and
    /// the lexical index. Chunk identities are deterministic, so replaying
    /// an ingestion attempt lands on the same state.
    pub fn upsert_chunks(&self, doc_id: &Uuid, chunks: &[Chunk]) -> Result<()> {
        {
            let mut map = self.chunks.write();
            map.retain(|_, c| &c.doc_id != doc_id);
            for chunk in chunks {
                map.insert(chunk.chunk_id.clone(), chunk.clone());
            }
        }

        {
            let _guard = self.writer_lock.lock();
            let mut writer: IndexWriter = self
                .index
                .writer(50_000_000)
                .context("Failed to create index writer")?;
            writer.delete_term(tantivy::Term::from_field_text(
                self.f_doc_id,
                &doc_id.to_string(),
            ));
            for chunk in chunks {
                writer.add_document(doc!(
                    self.f_chunk_id => chunk.chunk_id.clone(),
                    self.f_doc_id => chunk.doc_id.to_string(),
                    self.f_user_id => chunk.user_id.clone(),
                    self.f_text => chunk.text.clone(),
                ))?;
            }
            writer.commit().context("Failed to commit chunk batch")?;
        }

        self.persist()
    }

    /// Remove all of a document's chunks. Absent is success.
    pub fn delete_chunks(&self, doc_id: &Uuid) -> Result<()> {
        {
            let mut map = self.chunks.write();
            map.retain(|_, c| &c.doc_id != doc_id);
        }

        {
            let _guard = self.writer_lock.lock();
            let mut writer: IndexWriter = self
                .index
                .writer(50_000_000)
                .context("Failed to create index writer")?;
            writer.delete_term(tantivy::Term::from_field_text(
                self.f_doc_id,
                &doc_id.to_string(),
            ));
            writer.commit().context("Failed to commit chunk delete")?;
        }

        self.persist()
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Option<Chunk> {
        self.chunks.read().get(chunk_id).cloned()
    }

    pub fn chunk_count(&self, doc_id: &Uuid) -> usize {
        self.chunks
            .read()
            .values()
            .filter(|c| &c.doc_id == doc_id)
            .count()
    }

    /// Lexical (BM25) search over chunk text restricted to one user.
    /// Returns `(chunk_id, score)` ordered by descending score.
    pub fn text_search(
        &self,
        query_str: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<(String, f32)>> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.f_text]);
        let query = query_parser
            .parse_query(query_str)
            .context("Failed to parse search query")?;

        // Over-fetch, then filter by owner on the stored field.
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit * 4))
            .context("Search failed")?;

        let mut hits = Vec::new();
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let hit_user = doc
                .get_first(self.f_user_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if hit_user != user_id {
                continue;
            }

            let chunk_id = doc
                .get_first(self.f_chunk_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if chunk_id.is_empty() {
                continue;
            }

            hits.push((chunk_id, score));
            if hits.len() >= limit {
                break;
            }
        }

        Ok(hits)
    }

    // ─── Vector mappings ─────────────────────────────────

    pub fn upsert_mappings(&self, mappings: &[VectorMapping]) -> Result<()> {
        {
            let mut map = self.mappings.write();
            for m in mappings {
                map.insert(m.vector_id, m.clone());
            }
        }
        self.persist()
    }

    pub fn get_mapping(&self, vector_id: i64) -> Option<VectorMapping> {
        self.mappings.read().get(&vector_id).cloned()
    }

    pub fn mappings_for_document(&self, doc_id: &Uuid) -> Vec<VectorMapping> {
        self.mappings
            .read()
            .values()
            .filter(|m| &m.doc_id == doc_id)
            .cloned()
            .collect()
    }

    pub fn mapping_count(&self, doc_id: &Uuid) -> usize {
        self.mappings
            .read()
            .values()
            .filter(|m| &m.doc_id == doc_id)
            .count()
    }

    /// The vector ids a user's chunks occupy, for restricting dense search.
    pub fn vector_ids_for_user(&self, user_id: &str) -> HashSet<i64> {
        self.mappings
            .read()
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.vector_id)
            .collect()
    }

    /// Remove all of a document's mappings. Absent is success.
    pub fn delete_mappings(&self, doc_id: &Uuid) -> Result<usize> {
        let removed = {
            let mut map = self.mappings.write();
            let before = map.len();
            map.retain(|_, m| &m.doc_id != doc_id);
            before - map.len()
        };
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Persist the record snapshot (atomic write via temp file + rename).
    fn persist(&self) -> Result<()> {
        let data = {
            let documents = self.documents.read();
            let chunks = self.chunks.read();
            let mappings = self.mappings.read();
            serde_json::to_string(&PersistedStore {
                documents: documents.clone(),
                chunks: chunks.clone(),
                mappings: mappings.clone(),
            })?
        };
        let tmp_path = self.db_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data).context("Failed to write store")?;
        std::fs::rename(&tmp_path, &self.db_path).context("Failed to replace store")?;
        Ok(())
    }
}
