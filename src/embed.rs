//! Embedder: turns chunk text into fixed-dimension float vectors.
//!
//! `HashEmbedder` is the offline default (deterministic, no network). The
//! reqwest-based HTTP plumbing and header/bearer-auth pattern are grounded
//! on `ai::client::AiClient`, narrowed from chat completions to a single
//! embeddings endpoint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IndexError, IndexResult};

pub const DEFAULT_DIMENSION: usize = 256;

pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>>;
}

/// Deterministic offline embedder: hashes each text into a pseudo-random
/// unit vector. Produces stable, repeatable vectors without a network
/// dependency, useful for tests and air-gapped indexing.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
    }
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = Vec::with_capacity(dimension);
    let mut counter: u32 = 0;
    while vector.len() < dimension {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for chunk in digest.chunks(4) {
            if vector.len() >= dimension {
                break;
            }
            let bytes: [u8; 4] = chunk.try_into().unwrap();
            let raw = u32::from_le_bytes(bytes);
            vector.push((raw as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        counter += 1;
    }
    normalize(&mut vector);
    vector
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// HTTP embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
/// Reads its bearer token from `CONTEXT_INDEX_EMBEDDING_API_KEY`.
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
    http: reqwest::blocking::Client,
}

impl HttpEmbedder {
    pub fn from_env(endpoint: impl Into<String>, model: impl Into<String>, dimension: usize) -> IndexResult<Self> {
        let api_key = std::env::var("CONTEXT_INDEX_EMBEDDING_API_KEY")
            .map_err(|_| IndexError::Embedding("CONTEXT_INDEX_EMBEDDING_API_KEY not set".to_string()))?;
        Ok(Self { endpoint: endpoint.into(), model: model.into(), api_key, dimension, http: reqwest::blocking::Client::new() })
    }
}

impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(IndexError::from)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(IndexError::Embedding(format!("embedding request failed ({}): {}", status, text)));
        }

        let parsed: EmbeddingResponse = response.json().map_err(IndexError::from)?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_produces_identical_vector() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed_batch(&["hello".to_string()]).unwrap();
        let b = embedder.embed_batch(&["hello".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_produces_different_vector() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed_batch(&["hello".to_string()]).unwrap();
        let b = embedder.embed_batch(&["goodbye".to_string()]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vectors_have_configured_dimension() {
        let embedder = HashEmbedder::new(64);
        let out = embedder.embed_batch(&["x".to_string()]).unwrap();
        assert_eq!(out[0].len(), 64);
    }

    #[test]
    fn vectors_are_unit_norm() {
        let embedder = HashEmbedder::new(16);
        let out = embedder.embed_batch(&["anything".to_string()]).unwrap();
        let norm: f32 = out[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_batch_yields_empty_output() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }
}
