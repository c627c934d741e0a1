/// Collapse every run of whitespace (newlines included) to a single space and
/// trim both ends.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into display tokens.
///
/// Fragments without a single word character (a lone dash, a pipe, stray
/// quotes) are dropped; punctuation attached to a word stays with it.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|fragment| has_word_char(fragment))
        .map(str::to_string)
        .collect()
}

/// Normalize then tokenize one raw text block.
pub fn tokenize_block(raw: &str) -> Vec<String> {
    tokenize(&normalize(raw))
}

fn has_word_char(fragment: &str) -> bool {
    fragment.chars().any(|c| c.is_alphanumeric() || c == '_')
}
