//! Embedding generation via Ollama or OpenAI-compatible APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunking::{token_count, truncate_tokens};
use crate::config::LlmConfig;
use crate::error::PipelineError;
use crate::llm::EmbeddingProvider;

/// Maximum tokens to send per text to the embedding API. Chunk windows are
/// well under this; it guards direct query embedding of oversized input.
const MAX_EMBED_TOKENS: usize = 2_000;

pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// The returned vectors must match the configured dimension; anything
    /// else is a deployment misconfiguration surfaced on first use.
    fn check_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<(), PipelineError> {
        for e in embeddings {
            if e.len() != self.config.embedding_dim {
                return Err(PipelineError::DimensionMismatch {
                    expected: self.config.embedding_dim,
                    got: e.len(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| {
                if token_count(t) > MAX_EMBED_TOKENS {
                    truncate_tokens(t, MAX_EMBED_TOKENS)
                } else {
                    t.clone()
                }
            })
            .collect();

        let embeddings = match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, &truncated).await?,
            "openai" => embed_openai(&self.client, &self.config, &truncated).await?,
            other => {
                return Err(PipelineError::Embedding(format!(
                    "unknown LLM provider: {other}"
                )))
            }
        };

        if embeddings.len() != texts.len() {
            return Err(PipelineError::Embedding(format!(
                "provider returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        self.check_dimensions(&embeddings)?;
        Ok(embeddings)
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's
    /// context length instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let url = format!("{}/api/embed", config.base_url);

    // Ollama supports batch embedding with the /api/embed endpoint
    let batch_size = 32;
    let mut all_embeddings = Vec::new();

    for chunk in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: config.embedding_model.clone(),
            input: chunk.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| PipelineError::Embedding(format!("failed to call Ollama embed API: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Embedding(format!(
                "Ollama embed API returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Embedding(format!("failed to parse Ollama embed response: {e}")))?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::new();

    for chunk in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.embedding_model.clone(),
            input: chunk.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| PipelineError::Embedding(format!("failed to call OpenAI embed API: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Embedding(format!(
                "OpenAI embed API returned {status}: {body}"
            )));
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Embedding(format!("failed to parse OpenAI embed response: {e}")))?;

        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}
