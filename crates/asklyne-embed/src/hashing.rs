//! Deterministic, dependency-free stand-ins for the embedding and rerank models.
//!
//! Useful offline and in tests: vectors come from hashing whitespace tokens into
//! buckets, scores from query-term overlap. Neither captures semantics.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use asklyne_core::traits::{Embedder, PairScorer};

use crate::hub::ModelLoader;

pub struct HashingEmbedder {
    model_id: String,
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(model_id: impl Into<String>, dim: usize) -> Self {
        Self { model_id: model_id.into(), dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if self.dim == 0 { anyhow::bail!("{} has zero dimension", self.model_id); }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Fraction of distinct query terms present in the text, in `[0, 1]`.
pub struct LexicalScorer {
    model_id: String,
}

impl LexicalScorer {
    pub fn new(model_id: impl Into<String>) -> Self { Self { model_id: model_id.into() } }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase).collect()
}

impl PairScorer for LexicalScorer {
    fn model_id(&self) -> &str { &self.model_id }
    fn score(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>> {
        Ok(pairs
            .iter()
            .map(|(query, text)| {
                let wanted = terms(query);
                if wanted.is_empty() { return 0.0; }
                let present = terms(text);
                wanted.iter().filter(|t| present.contains(*t)).count() as f32 / wanted.len() as f32
            })
            .collect())
    }
}

/// Loader that answers every model id with a hashing embedder or lexical scorer.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashingLoader;

impl ModelLoader for HashingLoader {
    fn load_embedder(&self, model_id: &str, dim: usize) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(Arc::new(HashingEmbedder::new(model_id, dim)))
    }
    fn load_scorer(&self, model_id: &str) -> anyhow::Result<Arc<dyn PairScorer>> {
        Ok(Arc::new(LexicalScorer::new(model_id)))
    }
}
