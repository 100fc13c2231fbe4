//! Process-wide cache of loaded models.
//!
//! Populated on first use (or eagerly via `ModelHub::preload` at startup) and
//! read-only afterwards. Each key owns a `OnceCell`, so concurrent first
//! requests for the same model wait on a single in-flight load instead of
//! loading twice. A failed load leaves the cell empty and the next caller retries.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::info;

pub struct ModelRegistry<M: ?Sized> {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<M>>>>>,
}

impl<M: ?Sized + Send + Sync> ModelRegistry<M> {
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }

    /// Return the model for `key`, running `load` only if no load has completed yet.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> anyhow::Result<Arc<M>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<M>>>,
    {
        let slot = Arc::clone(self.slots.lock().entry(key.to_string()).or_default());
        let model = slot
            .get_or_try_init(|| async {
                let started = Instant::now();
                let model = load().await?;
                info!(model = key, elapsed_ms = started.elapsed().as_millis() as u64, "model loaded");
                Ok::<_, anyhow::Error>(model)
            })
            .await?;
        Ok(Arc::clone(model))
    }

    pub fn get(&self, key: &str) -> Option<Arc<M>> {
        self.slots.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Keys with a completed load, sorted.
    pub fn loaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl<M: ?Sized + Send + Sync> Default for ModelRegistry<M> {
    fn default() -> Self { Self::new() }
}
