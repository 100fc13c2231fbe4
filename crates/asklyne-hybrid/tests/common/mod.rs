#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asklyne_core::traits::{Completion, KeywordStore, VectorStore};
use asklyne_core::types::{ChunkPayload, KeywordDocument, ScoredText, SearchFilter, VectorPoint};
use asklyne_core::TierPolicy;
use asklyne_embed::{HashingLoader, ModelHub};

#[derive(Clone)]
pub enum Behavior {
    Hits(Vec<ScoredText>),
    Fail(&'static str),
    Stall,
    /// Answer with these hits after the delay.
    Delayed(Duration, Vec<ScoredText>),
}

/// Store with scripted search results that counts calls.
pub struct ScriptedStore {
    behavior: Behavior,
    pub searches: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { behavior, searches: AtomicUsize::new(0), upserts: AtomicUsize::new(0) })
    }

    pub fn hits(texts: &[(&str, f32)]) -> Arc<Self> {
        Self::new(Behavior::Hits(texts.iter().map(|(t, s)| ScoredText { text: t.to_string(), score: *s }).collect()))
    }

    async fn respond(&self) -> anyhow::Result<Vec<ScoredText>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Hits(h) => Ok(h.clone()),
            Behavior::Fail(msg) => anyhow::bail!("{msg}"),
            Behavior::Delayed(delay, h) => {
                tokio::time::sleep(*delay).await;
                Ok(h.clone())
            }
            Behavior::Stall => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }

    fn record_upsert(&self) -> anyhow::Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Fail(msg) => anyhow::bail!("{msg}"),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn upsert(&self, _collection: &str, _points: Vec<VectorPoint>) -> anyhow::Result<()> { self.record_upsert() }
    async fn search(&self, _collection: &str, _query_vector: &[f32], _top_k: usize, _filter: &SearchFilter) -> anyhow::Result<Vec<ScoredText>> {
        self.respond().await
    }
}

#[async_trait]
impl KeywordStore for ScriptedStore {
    async fn upsert(&self, _collection: &str, _documents: Vec<KeywordDocument>) -> anyhow::Result<()> { self.record_upsert() }
    async fn search(&self, _collection: &str, _query: &str, _top_k: usize, _filter: &SearchFilter) -> anyhow::Result<Vec<ScoredText>> {
        self.respond().await
    }
}

/// In-memory store that honours ids, collections and filters.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<(String, String, ChunkPayload)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn len(&self, collection: &str) -> usize {
        self.rows.lock().iter().filter(|(c, _, _)| c == collection).count()
    }

    pub fn ids(&self) -> Vec<String> {
        self.rows.lock().iter().map(|(_, id, _)| id.clone()).collect()
    }

    fn put(&self, collection: &str, id: String, payload: ChunkPayload) {
        let mut rows = self.rows.lock();
        rows.retain(|(c, existing, _)| !(c == collection && *existing == id));
        rows.push((collection.to_string(), id, payload));
    }

    fn find(&self, collection: &str, filter: &SearchFilter, top_k: usize, keep: impl Fn(&str) -> bool) -> Vec<ScoredText> {
        self.rows
            .lock()
            .iter()
            .filter(|(c, _, p)| c == collection && filter.matches(p) && keep(&p.text))
            .take(top_k)
            .map(|(_, _, p)| ScoredText { text: p.text.clone(), score: 1.0 })
            .collect()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> anyhow::Result<()> {
        for p in points { self.put(collection, p.id, p.payload); }
        Ok(())
    }
    async fn search(&self, collection: &str, _query_vector: &[f32], top_k: usize, filter: &SearchFilter) -> anyhow::Result<Vec<ScoredText>> {
        Ok(self.find(collection, filter, top_k, |_| true))
    }
}

#[async_trait]
impl KeywordStore for MemoryStore {
    async fn upsert(&self, collection: &str, documents: Vec<KeywordDocument>) -> anyhow::Result<()> {
        for d in documents { self.put(collection, d.id, d.payload); }
        Ok(())
    }
    async fn search(&self, collection: &str, query: &str, top_k: usize, filter: &SearchFilter) -> anyhow::Result<Vec<ScoredText>> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(self.find(collection, filter, top_k, |text| {
            let text = text.to_lowercase();
            words.iter().any(|w| text.contains(w.as_str()))
        }))
    }
}

/// Completion fake that records prompts.
pub struct RecordingCompletion {
    pub prompts: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingCompletion {
    pub fn ok() -> Arc<Self> { Arc::new(Self { prompts: Mutex::new(Vec::new()), fail: false }) }
    pub fn failing() -> Arc<Self> { Arc::new(Self { prompts: Mutex::new(Vec::new()), fail: true }) }
    pub fn calls(&self) -> usize { self.prompts.lock().len() }
}

#[async_trait]
impl Completion for RecordingCompletion {
    async fn complete(&self, prompt: &str, model_id: &str) -> anyhow::Result<String> {
        self.prompts.lock().push((prompt.to_string(), model_id.to_string()));
        if self.fail { anyhow::bail!("upstream 503"); }
        Ok("generated answer".to_string())
    }
}

pub fn policy() -> Arc<TierPolicy> { Arc::new(TierPolicy::standard()) }

pub fn hub() -> Arc<ModelHub> { Arc::new(ModelHub::new(Arc::new(HashingLoader))) }
