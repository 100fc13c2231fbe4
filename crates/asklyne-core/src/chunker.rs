//! Token-aware chunking for uploaded text and code.
//!
//! Content is split into atomic units (sentences for text, definition blocks for
//! code) that are never cut. Units are packed into windows bounded by
//! `max_tokens`; each new window is seeded with a trailing slice of the previous
//! one worth at least `overlap_tokens`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::tokens::{estimate_for_chars, estimate_tokens};
use crate::types::{Chunk, Mode};

/// Lines whose first token is one of these open a new code block.
const DEFINITION_KEYWORDS: [&str; 9] = [
    "def", "async def", "class", "fn", "pub fn", "async fn", "pub async fn", "function", "func",
];

const TEXT_JOINER: &str = " ";
const CODE_JOINER: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 256, overlap_tokens: 50 }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    mode: Mode,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(mode: Mode, config: ChunkingConfig) -> Result<Self> {
        if config.max_tokens == 0 {
            return Err(Error::InvalidInput("max_tokens must be positive".to_string()));
        }
        Ok(Self { mode, config })
    }

    pub fn mode(&self) -> Mode { self.mode }

    pub fn chunk(&self, content: &str) -> Vec<Chunk> {
        let units = split_units(content, self.mode);
        let joiner = match self.mode { Mode::Text => TEXT_JOINER, Mode::Code => CODE_JOINER };
        let texts = pack_units(&units, joiner, self.config);
        debug!(mode = %self.mode, units = units.len(), chunks = texts.len(), "chunked content");
        texts.into_iter().enumerate().map(|(sequence_index, text)| Chunk { text, sequence_index }).collect()
    }
}

/// Convenience form returning only the chunk texts.
pub fn chunk(content: &str, mode: Mode, max_tokens: usize, overlap_tokens: usize) -> Result<Vec<String>> {
    let chunker = Chunker::new(mode, ChunkingConfig { max_tokens, overlap_tokens })?;
    Ok(chunker.chunk(content).into_iter().map(|c| c.text).collect())
}

/// The atomic units a chunk is built from, in document order.
pub fn split_units(content: &str, mode: Mode) -> Vec<&str> {
    match mode {
        Mode::Text => split_sentences(content),
        Mode::Code => split_code_blocks(content),
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') { continue; }
        let Some(&(end, next)) = chars.peek() else { break };
        if !next.is_whitespace() { continue; }
        sentences.push(&text[start..end]);
        while chars.peek().is_some_and(|&(_, w)| w.is_whitespace()) { chars.next(); }
        start = chars.peek().map_or(text.len(), |&(i, _)| i);
    }
    if start < text.len() { sentences.push(&text[start..]); }
    sentences.retain(|s| !s.is_empty());
    sentences
}

fn split_code_blocks(code: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    for line in code.split_inclusive('\n') {
        if offset > start && opens_definition(line) {
            blocks.push(&code[start..offset]);
            start = offset;
        }
        offset += line.len();
    }
    blocks.push(&code[start..]);
    blocks.into_iter().map(str::trim).filter(|b| !b.is_empty()).collect()
}

fn opens_definition(line: &str) -> bool {
    let line = line.trim_start();
    DEFINITION_KEYWORDS
        .iter()
        .any(|kw| line.strip_prefix(kw).is_some_and(|rest| rest.starts_with(char::is_whitespace)))
}

/// Running window of units with both accountings the size bound needs.
struct Window<'a> {
    units: Vec<&'a str>,
    unit_tokens: usize,
    chars: usize,
    joiner_chars: usize,
}

impl<'a> Window<'a> {
    fn new(joiner: &str) -> Self {
        Self { units: Vec::new(), unit_tokens: 0, chars: 0, joiner_chars: joiner.chars().count() }
    }

    fn is_empty(&self) -> bool { self.units.is_empty() }

    /// Cost of the window with `unit` appended: the larger of the summed unit
    /// estimates and the estimate of the joined text.
    fn cost_with(&self, unit: &str) -> usize {
        let unit_chars = unit.chars().count();
        if self.is_empty() {
            return estimate_for_chars(unit_chars);
        }
        let summed = self.unit_tokens + estimate_tokens(unit);
        let joined = estimate_for_chars(self.chars + self.joiner_chars + unit_chars);
        summed.max(joined)
    }

    fn push(&mut self, unit: &'a str) {
        let unit_chars = unit.chars().count();
        self.chars += if self.is_empty() { unit_chars } else { self.joiner_chars + unit_chars };
        self.unit_tokens += estimate_tokens(unit);
        self.units.push(unit);
    }

    fn recompute(&mut self) {
        let units = std::mem::take(&mut self.units);
        self.unit_tokens = 0;
        self.chars = 0;
        for unit in units { self.push(unit); }
    }

    /// Keep the shortest suffix worth at least `overlap_tokens`.
    fn retain_overlap(&mut self, overlap_tokens: usize) {
        let mut kept = 0usize;
        let mut kept_tokens = 0usize;
        while kept < self.units.len() && kept_tokens < overlap_tokens {
            kept += 1;
            kept_tokens += estimate_tokens(self.units[self.units.len() - kept]);
        }
        self.units.drain(..self.units.len() - kept);
        self.recompute();
    }

    fn drop_oldest(&mut self) {
        if !self.units.is_empty() {
            self.units.remove(0);
            self.recompute();
        }
    }
}

fn pack_units(units: &[&str], joiner: &str, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window = Window::new(joiner);
    for &unit in units {
        if !window.is_empty() && window.cost_with(unit) > config.max_tokens {
            chunks.push(window.units.join(joiner));
            window.retain_overlap(config.overlap_tokens);
            // The size bound wins over the overlap.
            while !window.is_empty() && window.cost_with(unit) > config.max_tokens {
                window.drop_oldest();
            }
        }
        if window.is_empty() && estimate_tokens(unit) > config.max_tokens {
            chunks.push(unit.to_string());
            continue;
        }
        window.push(unit);
    }
    if !window.is_empty() {
        chunks.push(window.units.join(joiner));
    }
    chunks
}
