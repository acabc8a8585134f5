//! Parsing of loosely-structured JSON answers
//!
//! Small models wrap JSON in prose or markdown fences, or skip it entirely.
//! Malformed output is an expected outcome here, so it is a value the caller
//! matches on rather than an error.

use serde::de::DeserializeOwned;

/// Outcome of parsing an LLM answer as JSON
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput<T> {
    /// The answer contained a JSON value of the expected shape
    Parsed(T),
    /// No usable JSON was found
    Malformed { reason: String },
}

impl<T> StructuredOutput<T> {
    /// Convert into an `Option`, discarding the failure reason
    pub fn ok(self) -> Option<T> {
        match self {
            StructuredOutput::Parsed(value) => Some(value),
            StructuredOutput::Malformed { .. } => None,
        }
    }
}

/// Parse `raw` as `T`, tolerating fences and surrounding prose
///
/// Candidates are tried in order: the whole trimmed answer, the body of the
/// first fenced code block, then the outermost `{...}` or `[...]` span.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> StructuredOutput<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return StructuredOutput::Malformed {
            reason: "empty response".to_string(),
        };
    }

    let mut last_error = None;
    for candidate in candidates(trimmed) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return StructuredOutput::Parsed(value),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    let reason = last_error.unwrap_or_else(|| "no JSON found".to_string());
    tracing::debug!(
        response_length = raw.len(),
        reason = %reason,
        "LLM answer did not contain the expected JSON"
    );
    StructuredOutput::Malformed { reason }
}

fn candidates(text: &str) -> Vec<&str> {
    let mut found = vec![text];

    if let Some(fenced) = fenced_block(text) {
        found.push(fenced);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                found.push(&text[start..=end]);
            }
        }
    }

    found
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the opening fence line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_plain_json_parses() {
        let parsed: StructuredOutput<HashMap<String, String>> =
            parse_structured(r#"{"meeting": "party"}"#);
        assert_eq!(
            parsed.ok().and_then(|m| m.get("meeting").cloned()),
            Some("party".to_string())
        );
    }

    #[test]
    fn test_fenced_json_parses() {
        let raw = "Sure! Here you go:\n```json\n{\"report\": \"memoir\"}\n```\nEnjoy.";
        let parsed: StructuredOutput<HashMap<String, String>> = parse_structured(raw);
        assert!(matches!(parsed, StructuredOutput::Parsed(ref m) if m["report"] == "memoir"));
    }

    #[test]
    fn test_json_embedded_in_prose_parses() {
        let raw = r#"Dictionary: {"presentation": "stand-up routine"} - that should do it"#;
        let parsed: StructuredOutput<HashMap<String, String>> = parse_structured(raw);
        assert!(matches!(parsed, StructuredOutput::Parsed(_)));
    }

    #[test]
    fn test_array_parses() {
        let parsed: StructuredOutput<Vec<String>> = parse_structured(r#"topics: ["a", "b"]"#);
        assert_eq!(parsed, StructuredOutput::Parsed(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_prose_is_malformed() {
        let parsed: StructuredOutput<HashMap<String, String>> =
            parse_structured("I would rather not prank Dwight today.");
        assert!(matches!(parsed, StructuredOutput::Malformed { .. }));
    }

    #[test]
    fn test_empty_is_malformed() {
        let parsed: StructuredOutput<Vec<String>> = parse_structured("   ");
        assert_eq!(
            parsed,
            StructuredOutput::Malformed {
                reason: "empty response".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let parsed: StructuredOutput<HashMap<String, String>> = parse_structured("[1, 2, 3]");
        assert!(parsed.ok().is_none());
    }
}
