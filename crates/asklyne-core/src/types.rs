//! Domain types shared by the chunker, the stores and the read path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::tokens::estimate_tokens;

/// Capability class of a request. Ordered `Free < Plus < Pro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Plus,
    Pro,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Plus, Tier::Pro];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Plus => "plus",
            Tier::Pro => "pro",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "plus" => Ok(Tier::Plus),
            "pro" => Ok(Tier::Pro),
            other => Err(Error::InvalidConfig(format!("unknown tier '{other}'"))),
        }
    }
}

/// Content category. Selects the chunking strategy and the embedding space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Code,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Text, Mode::Code];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Text => "text",
            Mode::Code => "code",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Mode {
    type Err = Error;

    /// `notes` is accepted at input time: OCR output is plain text.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "notes" => Ok(Mode::Text),
            "code" => Ok(Mode::Code),
            other => Err(Error::InvalidConfig(format!("unknown mode '{other}'"))),
        }
    }
}

/// Caller-supplied conversation scope. Never inferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(String);

impl Session {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("session id must not be empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A bounded unit of source content, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub sequence_index: usize,
}

impl Chunk {
    pub fn token_estimate(&self) -> usize { estimate_tokens(&self.text) }
}

/// Which engine produced a hit. `Reranked` marks a score rewritten by the pair scorer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Keyword,
    Reranked,
}

/// A retrieved chunk text with its score.
///
/// Before reranking the score is engine-specific and only comparable within one
/// source. Higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
    pub source: SourceKind,
}

impl SearchHit {
    pub fn new(text: impl Into<String>, score: f32, source: SourceKind) -> Self {
        Self { text: text.into(), score, source }
    }
}

/// A hit after the rerank stage.
pub type RankedChunk = SearchHit;

/// Raw hit as returned by either store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredText {
    pub text: String,
    pub score: f32,
}

/// Payload persisted alongside every chunk in both stores. Note generation and
/// session logging read this exact shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub session_id: String,
    pub tier: Tier,
    pub mode: Mode,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordDocument {
    pub id: String,
    #[serde(flatten)]
    pub payload: ChunkPayload,
}

/// Scope applied to every search: one session, one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub session_id: String,
    pub mode: Mode,
}

impl SearchFilter {
    pub fn new(session: &Session, mode: Mode) -> Self {
        Self { session_id: session.as_str().to_string(), mode }
    }

    /// Key/value form handed to stores that take a generic filter map.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("mode".to_string(), self.mode.as_str().to_string()),
        ])
    }

    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        payload.session_id == self.session_id && payload.mode == self.mode
    }
}

/// How the retriever resolves the same text arriving from both backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionRule {
    /// The later-inserted hit (keyword) replaces the earlier one. Not a ranking decision.
    #[default]
    LastWriteWins,
    /// Keep whichever hit scored higher. Scores from different backends are not
    /// calibrated against each other, so this is a heuristic.
    MaxScore,
}
