//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `ASKLYNE_*` env vars (nested keys split on `__`, e.g.
//! `ASKLYNE_TIERS__FREE__TOKEN_LIMIT=1200`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::policy::{TierLimits, TierPolicy};
use crate::types::{FusionRule, Tier};

pub const ENV_PREFIX: &str = "ASKLYNE_";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        debug!(env = %env_name, "configuration sources merged");

        Ok(Self { figment })
    }

    /// Wrap an already assembled figment. Used by tests and embedders of the crate.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view over every section, validated.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tiers: TierSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub data: DataSettings,
    pub completion: CompletionSettings,
}

impl Settings {
    /// The built-in tier table with configured limit overrides applied.
    pub fn tier_policy(&self) -> Result<TierPolicy> {
        TierPolicy::standard()
            .with_limits(Tier::Free, &self.tiers.free)?
            .with_limits(Tier::Plus, &self.tiers.plus)?
            .with_limits(Tier::Pro, &self.tiers.pro)
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_tokens must be positive".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be positive".to_string()));
        }
        if self.retrieval.deadline_ms == 0 {
            return Err(Error::InvalidConfig("retrieval.deadline_ms must be positive".to_string()));
        }
        self.tier_policy().map(|_| ())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierSettings {
    pub free: TierLimits,
    pub plus: TierLimits,
    pub pro: TierLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub deadline_ms: u64,
    pub fusion: FusionRule,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, deadline_ms: 5_000, fusion: FusionRule::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub tantivy_dir: String,
    pub lancedb_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { tantivy_dir: "data/indexes/tantivy".to_string(), lancedb_dir: "data/indexes/lancedb".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.together.xyz/inference".to_string(),
            api_key: None,
            max_tokens: 512,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
