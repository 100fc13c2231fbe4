//! Token estimate shared by the chunker and the context packer.

/// Approximate language-model token count: one token per four characters,
/// never less than one.
pub fn estimate_tokens(text: &str) -> usize {
    estimate_for_chars(text.chars().count())
}

/// Same estimate, for a character count already at hand.
pub fn estimate_for_chars(chars: usize) -> usize {
    (chars / 4).max(1)
}
