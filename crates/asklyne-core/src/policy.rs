//! Tier capability table.
//!
//! One validated table over `Tier × Mode`. Construction fails on a missing or
//! duplicated pair, so `resolve` is a plain lookup afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Mode, Tier};

const MIB: usize = 1024 * 1024;

/// Share of the token limit the packed context may use, in percent.
pub const CONTEXT_BUDGET_PERCENT: usize = 90;

/// Everything the pipeline needs to know about one `(tier, mode)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierProfile {
    pub tier: Tier,
    pub mode: Mode,
    pub token_limit: usize,
    pub exchange_limit: usize,
    pub file_size_limit_mb: usize,
    pub vector_dimension: usize,
    pub embedding_model_id: String,
    pub rerank_enabled: bool,
    pub rerank_model_id: Option<String>,
    pub model_id: String,
}

impl TierProfile {
    /// Index namespace shared by the vector and keyword stores. Stable for the pair.
    pub fn collection_name(&self) -> String {
        format!("asklyne_chunks_{}_{}", self.tier, self.mode)
    }

    pub fn file_size_limit_bytes(&self) -> usize {
        self.file_size_limit_mb.saturating_mul(MIB)
    }

    /// `floor(token_limit * 0.9)`.
    pub fn context_budget(&self) -> usize {
        self.token_limit.saturating_mul(CONTEXT_BUDGET_PERCENT) / 100
    }

    fn validate(&self) -> Result<()> {
        let pair = format!("{}/{}", self.tier, self.mode);
        if self.token_limit == 0 {
            return Err(Error::InvalidConfig(format!("{pair}: token limit must be positive")));
        }
        if self.vector_dimension == 0 {
            return Err(Error::InvalidConfig(format!("{pair}: missing vector dimension")));
        }
        if self.embedding_model_id.trim().is_empty() || self.model_id.trim().is_empty() {
            return Err(Error::InvalidConfig(format!("{pair}: model ids must be set")));
        }
        if self.rerank_enabled && self.rerank_model_id.is_none() {
            return Err(Error::InvalidConfig(format!("{pair}: rerank enabled without a rerank model")));
        }
        Ok(())
    }
}

/// Per-tier limit overrides read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLimits {
    pub token_limit: Option<usize>,
    pub exchange_limit: Option<usize>,
    pub file_size_limit_mb: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierPolicy {
    // Row-major: tier, then mode.
    profiles: Vec<TierProfile>,
}

impl TierPolicy {
    /// The built-in table.
    pub fn standard() -> Self {
        Self { profiles: standard_profiles() }
    }

    /// Build from an arbitrary set of profiles. Every pair must appear exactly once.
    pub fn from_profiles(profiles: Vec<TierProfile>) -> Result<Self> {
        let mut slots: Vec<Option<TierProfile>> = vec![None; Tier::ALL.len() * Mode::ALL.len()];
        for profile in profiles {
            profile.validate()?;
            let slot = &mut slots[slot_index(profile.tier, profile.mode)];
            if slot.is_some() {
                return Err(Error::InvalidConfig(format!("duplicate profile for {}/{}", profile.tier, profile.mode)));
            }
            *slot = Some(profile);
        }
        let mut ordered = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            let tier = Tier::ALL[i / Mode::ALL.len()];
            let mode = Mode::ALL[i % Mode::ALL.len()];
            ordered.push(slot.ok_or_else(|| Error::InvalidConfig(format!("no profile for {tier}/{mode}")))?);
        }
        Ok(Self { profiles: ordered })
    }

    pub fn resolve(&self, tier: Tier, mode: Mode) -> &TierProfile {
        &self.profiles[slot_index(tier, mode)]
    }

    /// Resolve from wire names, failing on anything outside the closed sets.
    pub fn resolve_named(&self, tier: &str, mode: &str) -> Result<&TierProfile> {
        Ok(self.resolve(tier.parse()?, mode.parse()?))
    }

    /// Apply configured limit overrides to both modes of `tier`.
    pub fn with_limits(mut self, tier: Tier, limits: &TierLimits) -> Result<Self> {
        for profile in self.profiles.iter_mut().filter(|p| p.tier == tier) {
            if let Some(v) = limits.token_limit { profile.token_limit = v; }
            if let Some(v) = limits.exchange_limit { profile.exchange_limit = v; }
            if let Some(v) = limits.file_size_limit_mb { profile.file_size_limit_mb = v; }
            profile.validate()?;
        }
        Ok(self)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &TierProfile> {
        self.profiles.iter()
    }
}

impl Default for TierPolicy {
    fn default() -> Self { Self::standard() }
}

fn slot_index(tier: Tier, mode: Mode) -> usize {
    tier.index() * Mode::ALL.len() + mode.index()
}

struct Row {
    token_limit: usize,
    exchange_limit: usize,
    file_size_limit_mb: usize,
    rerank_model_id: Option<&'static str>,
    text: (&'static str, usize, &'static str),
    code: (&'static str, usize, &'static str),
}

const ROWS: [(Tier, Row); 3] = [
    (Tier::Free, Row {
        token_limit: 1000, exchange_limit: 30, file_size_limit_mb: 5,
        rerank_model_id: None,
        text: ("BAAI/bge-small-en-v1.5", 384, "meta-llama/Llama-3.2-3B-Instruct-Turbo"),
        code: ("microsoft/codebert-base", 768, "meta-llama/Llama-3.2-3B-Instruct-Turbo"),
    }),
    (Tier::Plus, Row {
        token_limit: 3000, exchange_limit: 70, file_size_limit_mb: 10,
        rerank_model_id: Some("cross-encoder/ms-marco-MiniLM-L-6-v2"),
        text: ("BAAI/bge-large-en-v1.5", 1024, "mistralai/Mistral-7B-Instruct-v0.3"),
        code: ("microsoft/unixcoder-base", 768, "Qwen/Qwen2.5-Coder-7B-Instruct"),
    }),
    (Tier::Pro, Row {
        token_limit: 8000, exchange_limit: 100, file_size_limit_mb: 20,
        rerank_model_id: Some("cross-encoder/ms-marco-MiniLM-L-12-v2"),
        text: ("intfloat/multilingual-e5-large", 1024, "mistralai/Mixtral-8x7B-Instruct-v0.1"),
        code: ("jinaai/jina-embeddings-v2-base-code", 768, "Qwen/Qwen2.5-Coder-32B-Instruct"),
    }),
];

fn standard_profiles() -> Vec<TierProfile> {
    let mut out = Vec::with_capacity(ROWS.len() * Mode::ALL.len());
    for (tier, row) in &ROWS {
        for (mode, (embedding, dim, model)) in [(Mode::Text, row.text), (Mode::Code, row.code)] {
            out.push(TierProfile {
                tier: *tier,
                mode,
                token_limit: row.token_limit,
                exchange_limit: row.exchange_limit,
                file_size_limit_mb: row.file_size_limit_mb,
                vector_dimension: dim,
                embedding_model_id: embedding.to_string(),
                rerank_enabled: row.rerank_model_id.is_some(),
                rerank_model_id: row.rerank_model_id.map(str::to_string),
                model_id: model.to_string(),
            });
        }
    }
    out
}
