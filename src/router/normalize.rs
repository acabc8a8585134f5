//! Normalization and exact matching of classifier answers

use super::ClassificationResult;
use super::registry::RegistrySnapshot;

const TRAILING_PUNCTUATION: &[char] = &['.', '!', '?', ',', ';', ':'];

/// Lowercase, drop all whitespace, strip trailing sentence punctuation
///
/// Applied identically to LLM answers and to agent names, so "SchruteBot",
/// " schrute bot. " and "SCHRUTEBOT!" all normalize to `schrutebot`.
pub fn normalize(raw: &str) -> String {
    let collapsed: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    collapsed.trim_end_matches(TRAILING_PUNCTUATION).to_string()
}

/// First agent, in registration order, whose normalized name equals `normalized`
///
/// Exact equality only. "I think SchruteBot" is a non-match, not a guess.
pub fn match_agent(normalized: &str, snapshot: &RegistrySnapshot) -> ClassificationResult {
    if normalized.is_empty() {
        return ClassificationResult::unmatched();
    }
    snapshot
        .iter()
        .find(|agent| normalize(agent.name()) == normalized)
        .map(|agent| ClassificationResult::matched(agent.clone()))
        .unwrap_or_else(ClassificationResult::unmatched)
}
