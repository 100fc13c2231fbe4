use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use asklyne_core::chunker::{Chunker, ChunkingConfig};
use asklyne_core::policy::TierPolicy;
use asklyne_core::traits::{KeywordStore, VectorStore};
use asklyne_core::types::{ChunkPayload, KeywordDocument, VectorPoint};
use asklyne_core::{Error, Mode, Result, Session, Tier};
use asklyne_embed::ModelHub;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub collection: String,
    pub chunks: usize,
}

/// Stable point id: re-ingesting the same text in the same scope overwrites.
pub fn point_id(session: &Session, mode: Mode, text: &str) -> String {
    let digest = blake3::hash(text.as_bytes()).to_hex();
    format!("{}:{}:{}", session, mode, &digest.as_str()[..16])
}

/// Write path: chunk, embed, then upsert into both stores.
pub struct Ingestor {
    policy: Arc<TierPolicy>,
    models: Arc<ModelHub>,
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(policy: Arc<TierPolicy>, models: Arc<ModelHub>, vector: Arc<dyn VectorStore>, keyword: Arc<dyn KeywordStore>) -> Self {
        Self { policy, models, vector, keyword, chunking: ChunkingConfig::default() }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self { self.chunking = chunking; self }

    pub async fn ingest(&self, content: &str, session: &Session, tier: Tier, mode: Mode) -> Result<IngestReport> {
        let started = Instant::now();
        let profile = self.policy.resolve(tier, mode);
        let collection = profile.collection_name();
        if content.len() > profile.file_size_limit_bytes() {
            return Err(Error::LimitExceeded(format!(
                "{} bytes exceeds the {} MB upload limit for {tier}",
                content.len(), profile.file_size_limit_mb
            )));
        }

        let chunks = Chunker::new(mode, self.chunking)?.chunk(content);
        if chunks.is_empty() {
            return Ok(IngestReport { collection, chunks: 0 });
        }

        let embedder = self.models.embedder_for(profile).await?;
        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        let (texts, vectors) = tokio::task::spawn_blocking(move || {
            let vectors = embedder.embed_batch(&texts);
            (texts, vectors)
        })
        .await
        .map_err(|e| Error::backend("embedder", e))?;
        let vectors = vectors.map_err(|e| Error::backend("embedder", e))?;
        if vectors.len() != texts.len() {
            return Err(Error::backend("embedder", format!("{} vectors for {} chunks", vectors.len(), texts.len())));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != profile.vector_dimension) {
            return Err(Error::backend("embedder", format!("{}-dim vector, expected {}", v.len(), profile.vector_dimension)));
        }

        let mut points = Vec::with_capacity(texts.len());
        let mut documents = Vec::with_capacity(texts.len());
        for (text, vector) in texts.into_iter().zip(vectors) {
            let id = point_id(session, mode, &text);
            let payload = ChunkPayload { session_id: session.as_str().to_string(), tier, mode, text };
            documents.push(KeywordDocument { id: id.clone(), payload: payload.clone() });
            points.push(VectorPoint { id, vector, payload });
        }
        let count = points.len();

        let (vector_res, keyword_res) = tokio::join!(
            self.vector.upsert(&collection, points),
            self.keyword.upsert(&collection, documents)
        );
        vector_res.map_err(|e| Error::backend("vector store", e))?;
        keyword_res.map_err(|e| Error::backend("keyword store", e))?;

        info!(session = %session, %collection, chunks = count, elapsed_ms = started.elapsed().as_millis() as u64, "ingested");
        Ok(IngestReport { collection, chunks: count })
    }
}
