use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asklyne_core::traits::{Embedder, PairScorer};
use asklyne_core::{Error, Mode, Tier, TierPolicy};
use asklyne_embed::{HashingEmbedder, HashingLoader, LexicalScorer, ModelHub, ModelLoader, ModelRegistry};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_share_one_load() {
    let registry: Arc<ModelRegistry<dyn Embedder>> = Arc::new(ModelRegistry::new());
    let loads = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let loads = Arc::clone(&loads);
        handles.push(tokio::spawn(async move {
            registry
                .get_or_load("BAAI/bge-small-en-v1.5", || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Arc::new(HashingEmbedder::new("BAAI/bge-small-en-v1.5", 384)) as Arc<dyn Embedder>)
                })
                .await
                .expect("load")
        }));
    }
    let models: Vec<_> = futures_join(handles).await;
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    for m in &models[1..] {
        assert!(Arc::ptr_eq(&models[0], m));
    }
    assert_eq!(registry.loaded_keys(), vec!["BAAI/bge-small-en-v1.5".to_string()]);
}

async fn futures_join<T>(handles: Vec<tokio::task::JoinHandle<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await.expect("task"));
    }
    out
}

#[tokio::test]
async fn failed_load_is_retried_by_next_caller() {
    let registry: ModelRegistry<dyn PairScorer> = ModelRegistry::new();
    let err = registry
        .get_or_load("cross-encoder/x", || async { Err(anyhow::anyhow!("weights missing")) })
        .await
        .err()
        .expect("load fails");
    assert!(err.to_string().contains("weights missing"));
    assert!(registry.get("cross-encoder/x").is_none());
    assert!(registry.loaded_keys().is_empty());

    let scorer = registry
        .get_or_load("cross-encoder/x", || async { Ok(Arc::new(LexicalScorer::new("cross-encoder/x")) as Arc<dyn PairScorer>) })
        .await
        .unwrap();
    assert_eq!(scorer.model_id(), "cross-encoder/x");
    assert!(registry.get("cross-encoder/x").is_some());
}

#[test]
fn hashing_embedder_is_deterministic_and_normalized() {
    let embedder = HashingEmbedder::new("hash", 64);
    let texts = vec!["Rust ownership rules".to_string(), "rust OWNERSHIP rules".to_string(), "bread".to_string()];
    let vectors = embedder.embed_batch(&texts).unwrap();
    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v.len() == 64));
    assert_eq!(vectors[0], vectors[1], "tokens are case-folded");
    assert_ne!(vectors[0], vectors[2]);
    let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[test]
fn lexical_scorer_rewards_query_term_coverage() {
    let scorer = LexicalScorer::new("lexical");
    let pairs = vec![
        ("borrow checker".to_string(), "The borrow checker rejects this.".to_string()),
        ("borrow checker".to_string(), "Only borrow here.".to_string()),
        ("borrow checker".to_string(), "Nothing relevant.".to_string()),
    ];
    assert_eq!(scorer.score(&pairs).unwrap(), vec![1.0, 0.5, 0.0]);
}

#[tokio::test]
async fn hub_serves_profile_models_and_skips_rerank_for_free() {
    let hub = ModelHub::new(Arc::new(HashingLoader));
    let policy = TierPolicy::standard();

    let free = policy.resolve(Tier::Free, Mode::Text);
    let embedder = hub.embedder_for(free).await.unwrap();
    assert_eq!(embedder.dim(), 384);
    assert!(hub.scorer_for(free).await.unwrap().is_none());

    let plus = policy.resolve(Tier::Plus, Mode::Code);
    let scorer = hub.scorer_for(plus).await.unwrap().expect("plus reranks");
    assert_eq!(scorer.model_id(), "cross-encoder/ms-marco-MiniLM-L-6-v2");
}

#[tokio::test]
async fn preload_loads_each_distinct_model_once() {
    let hub = ModelHub::new(Arc::new(HashingLoader));
    hub.preload(&TierPolicy::standard()).await.unwrap();
    // Six embedding models plus two rerank models.
    assert_eq!(hub.loaded_models().len(), 8);
}

struct MisreportingLoader;

impl ModelLoader for MisreportingLoader {
    fn load_embedder(&self, model_id: &str, _dim: usize) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(Arc::new(HashingEmbedder::new(model_id, 16)))
    }
    fn load_scorer(&self, _model_id: &str) -> anyhow::Result<Arc<dyn PairScorer>> {
        anyhow::bail!("no scorer available")
    }
}

#[tokio::test]
async fn dimension_mismatch_and_load_failures_surface_as_errors() {
    let hub = ModelHub::new(Arc::new(MisreportingLoader));
    let policy = TierPolicy::standard();
    let err = hub.embedder_for(policy.resolve(Tier::Pro, Mode::Text)).await.err().expect("mismatch");
    assert!(matches!(err, Error::InvalidConfig(_)));
    let err = hub.scorer_for(policy.resolve(Tier::Pro, Mode::Text)).await.err().expect("load failure");
    assert!(matches!(err, Error::Backend { .. }));
}
