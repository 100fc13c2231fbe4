use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use asklyne_core::policy::TierPolicy;
use asklyne_core::traits::{KeywordStore, VectorStore};
use asklyne_core::types::{FusionRule, ScoredText, SearchFilter, SearchHit, SourceKind};
use asklyne_core::{Error, Mode, Result, Session, Tier};
use asklyne_embed::ModelHub;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

type Lookup = JoinHandle<anyhow::Result<Vec<ScoredText>>>;

/// Hybrid retrieval over the vector and keyword stores.
pub struct Retriever {
    policy: Arc<TierPolicy>,
    models: Arc<ModelHub>,
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
    deadline: Duration,
    fusion: FusionRule,
}

impl Retriever {
    pub fn new(policy: Arc<TierPolicy>, models: Arc<ModelHub>, vector: Arc<dyn VectorStore>, keyword: Arc<dyn KeywordStore>) -> Self {
        Self { policy, models, vector, keyword, deadline: DEFAULT_DEADLINE, fusion: FusionRule::default() }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self { self.deadline = deadline; self }

    pub fn with_fusion(mut self, fusion: FusionRule) -> Self { self.fusion = fusion; self }

    /// Query both stores in parallel and fuse by exact text.
    ///
    /// One failing backend degrades to the other's hits. Both failing is a
    /// `Backend` error. If the deadline elapses first, both lookups are aborted
    /// and the call fails with `Timeout`.
    pub async fn retrieve(&self, query: &str, session: &Session, tier: Tier, mode: Mode, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let profile = self.policy.resolve(tier, mode);
        let embedder = self.models.embedder_for(profile).await?;
        let texts = vec![query.to_string()];
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::backend("embedder", e))?
            .map_err(|e| Error::backend("embedder", e))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::backend("embedder", "no vector returned for query"))?;

        let collection = profile.collection_name();
        let filter = SearchFilter::new(session, mode);

        let mut vector_task: Lookup = {
            let (store, collection, filter) = (Arc::clone(&self.vector), collection.clone(), filter.clone());
            tokio::spawn(async move { store.search(&collection, &query_vector, top_k, &filter).await })
        };
        let mut keyword_task: Lookup = {
            let (store, collection, filter, query) = (Arc::clone(&self.keyword), collection, filter, query.to_string());
            tokio::spawn(async move { store.search(&collection, &query, top_k, &filter).await })
        };

        let joined = tokio::time::timeout(self.deadline, async { tokio::join!(&mut vector_task, &mut keyword_task) }).await;
        let (vector_res, keyword_res) = match joined {
            Ok(results) => results,
            Err(_) => {
                vector_task.abort();
                keyword_task.abort();
                warn!(deadline_ms = self.deadline.as_millis() as u64, "retrieval deadline elapsed");
                return Err(Error::Timeout(self.deadline));
            }
        };

        let vector_hits = settle("vector", vector_res);
        let keyword_hits = settle("keyword", keyword_res);
        let (vector_hits, keyword_hits) = match (vector_hits, keyword_hits) {
            (Err(v), Err(k)) => {
                return Err(Error::Backend { backend: "retrieval", message: format!("vector: {v}; keyword: {k}") });
            }
            (v, k) => (v.unwrap_or_default(), k.unwrap_or_default()),
        };

        let fused = fuse(tag(vector_hits, SourceKind::Vector), tag(keyword_hits, SourceKind::Keyword), self.fusion);
        debug!(tier = %tier, mode = %mode, hits = fused.len(), "retrieved");
        Ok(fused)
    }
}

fn settle(backend: &str, joined: std::result::Result<anyhow::Result<Vec<ScoredText>>, tokio::task::JoinError>) -> std::result::Result<Vec<ScoredText>, String> {
    let outcome = match joined {
        Ok(Ok(hits)) => return Ok(hits),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    warn!(backend, error = %outcome, "search backend failed, continuing with the other");
    Err(outcome)
}

fn tag(raw: Vec<ScoredText>, source: SourceKind) -> Vec<SearchHit> {
    raw.into_iter().map(|r| SearchHit::new(r.text, r.score, source)).collect()
}

/// Merge two hit lists so that no text appears twice.
///
/// Each text keeps the position where it was first seen (vector hits first).
/// Which hit occupies that position is decided by `rule`.
pub fn fuse(vector: Vec<SearchHit>, keyword: Vec<SearchHit>, rule: FusionRule) -> Vec<SearchHit> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<SearchHit> = Vec::with_capacity(vector.len() + keyword.len());
    for hit in vector.into_iter().chain(keyword) {
        match position.get(&hit.text) {
            Some(&i) => {
                let replace = match rule {
                    FusionRule::LastWriteWins => true,
                    FusionRule::MaxScore => hit.score > merged[i].score,
                };
                if replace { merged[i] = hit; }
            }
            None => {
                position.insert(hit.text.clone(), merged.len());
                merged.push(hit);
            }
        }
    }
    merged
}
