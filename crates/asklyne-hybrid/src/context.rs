//! Budgeted context packing.

use std::cmp::Ordering;

use asklyne_core::policy::TierProfile;
use asklyne_core::tokens::estimate_for_chars;
use asklyne_core::types::SearchHit;

pub const SEPARATOR: &str = "\n---\n";

/// Selected chunk texts, best first, and the token estimate of their rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    pub texts: Vec<String>,
    pub tokens: usize,
}

impl ContextWindow {
    pub fn render(&self) -> String { self.texts.join(SEPARATOR) }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    budget: usize,
}

impl ContextBuilder {
    pub fn for_profile(profile: &TierProfile) -> Self { Self { budget: profile.context_budget() } }

    pub fn with_budget(budget: usize) -> Self { Self { budget } }

    pub fn budget(&self) -> usize { self.budget }

    /// Take hits by descending score until the next one would overflow the budget.
    ///
    /// Stops at the first misfit even if a later, shorter hit would fit.
    pub fn pack(&self, hits: &[SearchHit]) -> ContextWindow {
        let mut ordered: Vec<&SearchHit> = hits.iter().collect();
        ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let separator_chars = SEPARATOR.chars().count();
        let mut texts = Vec::new();
        let mut chars = 0usize;
        for hit in ordered {
            let text = hit.text.trim();
            if text.is_empty() { continue; }
            let next = if texts.is_empty() { text.chars().count() } else { chars + separator_chars + text.chars().count() };
            if estimate_for_chars(next) > self.budget { break; }
            texts.push(text.to_string());
            chars = next;
        }
        let tokens = if texts.is_empty() { 0 } else { estimate_for_chars(chars) };
        ContextWindow { texts, tokens }
    }

    pub fn build(&self, hits: &[SearchHit]) -> String { self.pack(hits).render() }
}

/// Context string for `profile`'s budget.
pub fn build(hits: &[SearchHit], profile: &TierProfile) -> String {
    ContextBuilder::for_profile(profile).build(hits)
}
