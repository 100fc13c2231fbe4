//! Seams to the external collaborators: models and stores.
//!
//! Stores and the completion endpoint are I/O bound and async. Embedding and
//! pair scoring are CPU-bound model calls and stay synchronous.

use async_trait::async_trait;

use crate::types::{KeywordDocument, ScoredText, SearchFilter, VectorPoint};

pub trait Embedder: Send + Sync {
    /// Identifier of the loaded model, e.g. `BAAI/bge-small-en-v1.5`.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// One vector per input text, each of length `dim()`.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Cross-encoder style relevance model over `(query, text)` pairs.
pub trait PairScorer: Send + Sync {
    fn model_id(&self) -> &str;
    fn score(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> anyhow::Result<()>;
    async fn search(&self, collection: &str, query_vector: &[f32], top_k: usize, filter: &SearchFilter) -> anyhow::Result<Vec<ScoredText>>;
}

#[async_trait]
pub trait KeywordStore: Send + Sync {
    async fn upsert(&self, collection: &str, documents: Vec<KeywordDocument>) -> anyhow::Result<()>;
    async fn search(&self, collection: &str, query: &str, top_k: usize, filter: &SearchFilter) -> anyhow::Result<Vec<ScoredText>>;
}

#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, model_id: &str) -> anyhow::Result<String>;
}
