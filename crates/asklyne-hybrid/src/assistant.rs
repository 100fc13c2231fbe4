use std::sync::Arc;
use tracing::{debug, info};

use asklyne_core::policy::TierPolicy;
use asklyne_core::traits::Completion;
use asklyne_core::{Error, Mode, Result, Session, Tier};

use crate::context::ContextBuilder;
use crate::reranker::Reranker;
use crate::retriever::Retriever;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub session: Session,
    pub query: String,
    pub tier: Tier,
    pub mode: Mode,
    /// Exchanges already spent in this session.
    pub exchanges_used: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Nothing relevant was retrieved; the model was not called.
    NoRelevantContent,
    Generated {
        text: String,
        context_tokens: usize,
        chunks_used: usize,
        warnings: Vec<String>,
    },
}

/// Read path: retrieve, rerank, pack, complete.
pub struct Assistant {
    policy: Arc<TierPolicy>,
    retriever: Retriever,
    reranker: Reranker,
    completion: Arc<dyn Completion>,
    top_k: usize,
}

impl Assistant {
    pub fn new(policy: Arc<TierPolicy>, retriever: Retriever, reranker: Reranker, completion: Arc<dyn Completion>) -> Self {
        Self { policy, retriever, reranker, completion, top_k: DEFAULT_TOP_K }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = top_k; self }

    pub async fn answer(&self, request: &QueryRequest) -> Result<Answer> {
        let profile = self.policy.resolve(request.tier, request.mode);
        if request.exchanges_used >= profile.exchange_limit {
            return Err(Error::LimitExceeded(format!(
                "{} exchanges used, {} allows {}",
                request.exchanges_used, request.tier, profile.exchange_limit
            )));
        }
        let question = request.query.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }

        let hits = self.retriever.retrieve(question, &request.session, request.tier, request.mode, self.top_k).await?;
        if hits.is_empty() {
            info!(session = %request.session, "no relevant content retrieved");
            return Ok(Answer::NoRelevantContent);
        }

        let reranked = self.reranker.rerank(question, hits, profile).await;
        let window = ContextBuilder::for_profile(profile).pack(&reranked.hits);
        debug!(chunks = window.texts.len(), tokens = window.tokens, budget = profile.context_budget(), "context packed");

        let prompt = build_prompt(&window.render(), question);
        let text = self
            .completion
            .complete(&prompt, &profile.model_id)
            .await
            .map_err(|e| Error::backend("completion", e))?;

        Ok(Answer::Generated {
            text,
            context_tokens: window.tokens,
            chunks_used: window.texts.len(),
            warnings: reranked.warning.into_iter().collect(),
        })
    }
}

pub fn build_prompt(context: &str, question: &str) -> String {
    if context.is_empty() {
        return format!("Question: {question}\nAnswer:");
    }
    format!("Use the context below to answer the question.\n\nContext:\n{context}\n\nQuestion: {question}\nAnswer:")
}
