use std::sync::Arc;
use tracing::debug;

use asklyne_core::policy::{TierPolicy, TierProfile};
use asklyne_core::traits::{Embedder, PairScorer};
use asklyne_core::{Error, Result};

use crate::registry::ModelRegistry;

/// Constructs model instances. Implementations may be slow (weights from disk or
/// network); they run on the blocking pool.
pub trait ModelLoader: Send + Sync {
    fn load_embedder(&self, model_id: &str, dim: usize) -> anyhow::Result<Arc<dyn Embedder>>;
    fn load_scorer(&self, model_id: &str) -> anyhow::Result<Arc<dyn PairScorer>>;
}

/// Resolves the embedder and pair scorer a tier profile asks for, loading each
/// model id at most once per process.
pub struct ModelHub {
    loader: Arc<dyn ModelLoader>,
    embedders: ModelRegistry<dyn Embedder>,
    scorers: ModelRegistry<dyn PairScorer>,
}

impl ModelHub {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self { loader, embedders: ModelRegistry::new(), scorers: ModelRegistry::new() }
    }

    pub async fn embedder_for(&self, profile: &TierProfile) -> Result<Arc<dyn Embedder>> {
        let loader = Arc::clone(&self.loader);
        let model_id = profile.embedding_model_id.clone();
        let dim = profile.vector_dimension;
        let embedder = self
            .embedders
            .get_or_load(&profile.embedding_model_id, || async move {
                tokio::task::spawn_blocking(move || loader.load_embedder(&model_id, dim)).await?
            })
            .await
            .map_err(|e| Error::backend("embedding model", e))?;
        if embedder.dim() != profile.vector_dimension {
            return Err(Error::InvalidConfig(format!(
                "{} produces {}-dim vectors but {}/{} is provisioned for {}",
                embedder.model_id(), embedder.dim(), profile.tier, profile.mode, profile.vector_dimension
            )));
        }
        Ok(embedder)
    }

    /// `None` when the profile does not rerank.
    pub async fn scorer_for(&self, profile: &TierProfile) -> Result<Option<Arc<dyn PairScorer>>> {
        let Some(model_id) = profile.rerank_model_id.as_ref().filter(|_| profile.rerank_enabled) else {
            return Ok(None);
        };
        let loader = Arc::clone(&self.loader);
        let id = model_id.clone();
        let scorer = self
            .scorers
            .get_or_load(model_id, || async move {
                tokio::task::spawn_blocking(move || loader.load_scorer(&id)).await?
            })
            .await
            .map_err(|e| Error::backend("rerank model", e))?;
        Ok(Some(scorer))
    }

    /// Load every model the policy references. Meant for process startup so that
    /// requests only ever read the registries.
    pub async fn preload(&self, policy: &TierPolicy) -> Result<()> {
        for profile in policy.profiles() {
            self.embedder_for(profile).await?;
            self.scorer_for(profile).await?;
        }
        debug!(embedders = ?self.embedders.loaded_keys(), scorers = ?self.scorers.loaded_keys(), "models preloaded");
        Ok(())
    }

    pub fn loaded_models(&self) -> Vec<String> {
        let mut all = self.embedders.loaded_keys();
        all.extend(self.scorers.loaded_keys());
        all
    }
}
