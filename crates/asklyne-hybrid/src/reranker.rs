use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use asklyne_core::policy::TierProfile;
use asklyne_core::traits::PairScorer;
use asklyne_core::types::{SearchHit, SourceKind};
use asklyne_embed::ModelHub;

/// Rerank output. `warning` is set when scoring failed and the input order was kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Reranked {
    pub hits: Vec<SearchHit>,
    pub warning: Option<String>,
}

impl Reranked {
    fn unchanged(hits: Vec<SearchHit>) -> Self { Self { hits, warning: None } }

    fn degraded(hits: Vec<SearchHit>, warning: String) -> Self {
        warn!(%warning, "rerank skipped, keeping retrieval order");
        Self { hits, warning: Some(warning) }
    }
}

pub struct Reranker {
    models: Arc<ModelHub>,
}

impl Reranker {
    pub fn new(models: Arc<ModelHub>) -> Self { Self { models } }

    /// Identity for tiers without rerank. Never fails: a scorer that cannot be
    /// loaded or that errors leaves the hits as they were.
    pub async fn rerank(&self, query: &str, hits: Vec<SearchHit>, profile: &TierProfile) -> Reranked {
        if hits.is_empty() || !profile.rerank_enabled {
            return Reranked::unchanged(hits);
        }
        match self.models.scorer_for(profile).await {
            Ok(scorer) => rerank_with(scorer.as_deref(), query, hits),
            Err(e) => Reranked::degraded(hits, format!("rerank model unavailable: {e}")),
        }
    }
}

/// Score every `(query, text)` pair, overwrite scores and stable-sort descending.
pub fn rerank_with(scorer: Option<&dyn PairScorer>, query: &str, hits: Vec<SearchHit>) -> Reranked {
    let Some(scorer) = scorer else { return Reranked::unchanged(hits) };
    if hits.is_empty() {
        return Reranked::unchanged(hits);
    }
    let pairs: Vec<(String, String)> = hits.iter().map(|h| (query.to_string(), h.text.clone())).collect();
    let scores = match scorer.score(&pairs) {
        Ok(scores) => scores,
        Err(e) => return Reranked::degraded(hits, format!("{} failed: {e}", scorer.model_id())),
    };
    if scores.len() != hits.len() {
        let warning = format!("{} returned {} scores for {} candidates", scorer.model_id(), scores.len(), hits.len());
        return Reranked::degraded(hits, warning);
    }
    let mut ranked: Vec<SearchHit> = hits
        .into_iter()
        .zip(scores)
        .map(|(hit, score)| SearchHit { score, source: SourceKind::Reranked, ..hit })
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    debug!(model = scorer.model_id(), candidates = ranked.len(), "reranked");
    Reranked::unchanged(ranked)
}
