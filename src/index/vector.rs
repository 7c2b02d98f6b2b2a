//! In-memory vector index with disk persistence and cosine similarity
//! search. The index knows nothing about chunks or users; it stores
//! `(id, vector)` pairs and the metadata store's mappings translate ids
//! back to chunks.

use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    dim: usize,
    entries: HashMap<i64, Vec<f32>>,
}

pub struct VectorIndex {
    dim: usize,
    entries: RwLock<HashMap<i64, Vec<f32>>>,
    persist_path: PathBuf,
}

impl VectorIndex {
    /// Open or create an index of fixed dimension `dim` persisted under
    /// `vector_dir`. A persisted index of a different dimension is a fatal
    /// configuration error; drop the data directory and re-ingest.
    pub fn open_or_create(vector_dir: &Path, dim: usize) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(vector_dir)
            .context("Failed to create vector directory")
            .map_err(PipelineError::Store)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector index")
                .map_err(PipelineError::Store)?;
            let persisted: PersistedIndex = serde_json::from_str(&data)
                .context("Failed to parse vector index")
                .map_err(PipelineError::Store)?;
            if persisted.dim != dim {
                return Err(PipelineError::DimensionMismatch {
                    expected: dim,
                    got: persisted.dim,
                });
            }
            persisted.entries
        } else {
            HashMap::new()
        };

        Ok(Self {
            dim,
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Add vectors by id. An existing id is replaced, so redelivered
    /// ingestion jobs overwrite rather than duplicate. Every vector must
    /// match the configured dimension.
    pub fn add(&self, vectors: &[(i64, Vec<f32>)]) -> Result<(), PipelineError> {
        for (_, v) in vectors {
            if v.len() != self.dim {
                return Err(PipelineError::DimensionMismatch {
                    expected: self.dim,
                    got: v.len(),
                });
            }
        }

        {
            let mut entries = self.entries.write();
            for (id, v) in vectors {
                entries.insert(*id, v.clone());
            }
        }
        self.persist()
    }

    /// Remove vectors by id. Absent ids are ignored.
    pub fn remove(&self, ids: &[i64]) -> Result<(), PipelineError> {
        {
            let mut entries = self.entries.write();
            for id in ids {
                entries.remove(id);
            }
        }
        self.persist()
    }

    /// Search by cosine similarity, optionally restricted to `allowed` ids.
    /// Results are ordered by descending score, ties broken by id for
    /// determinism.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        allowed: Option<&HashSet<i64>>,
    ) -> Result<Vec<(i64, f32)>, PipelineError> {
        if query.len() != self.dim {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }

        let entries = self.entries.read();
        let mut scored: Vec<(i64, f32)> = entries
            .iter()
            .filter(|(id, _)| allowed.map_or(true, |ids| ids.contains(id)))
            .map(|(id, v)| (*id, cosine_similarity(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Persist to disk (atomic write via temp file + rename).
    fn persist(&self) -> Result<(), PipelineError> {
        let data = {
            let entries = self.entries.read();
            serde_json::to_string(&PersistedIndex {
                dim: self.dim,
                entries: entries.clone(),
            })
            .context("Failed to serialize vector index")
            .map_err(PipelineError::Store)?
        };
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data)
            .context("Failed to write vector index")
            .map_err(PipelineError::Store)?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace vector index")
            .map_err(PipelineError::Store)?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
