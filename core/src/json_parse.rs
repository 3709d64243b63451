//! Strict-then-lenient JSON parsing of LLM outputs (spec §9 "Dynamic JSON parsing").
//!
//! Strip code-fence markers (```` ```json ... ``` ````, or bare ``` ```), then attempt a
//! strict parse. Callers supply the per-component default to fall back to on failure
//! (Classifier → `"other"`, Guard → compliant, Presentation → a static fallback).

use serde::de::DeserializeOwned;

/// Strips a leading/trailing Markdown code fence, if present, and trims whitespace.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the fence's first line (e.g. "```json\n").
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Attempts to parse `raw` as `T` after stripping any code fence. Returns `None` on failure;
/// callers apply their own component-specific default.
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let stripped = strip_code_fence(raw);
    serde_json::from_str(stripped).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Classification {
        intent: String,
        confidence: f64,
    }

    #[test]
    fn strips_fenced_json_with_language_tag() {
        let raw = "```json\n{\"intent\":\"billing\",\"confidence\":0.9}\n```";
        let parsed: Classification = parse_lenient(raw).unwrap();
        assert_eq!(parsed.intent, "billing");
        assert_eq!(parsed.confidence, 0.9);
    }

    #[test]
    fn strips_bare_fence_without_language_tag() {
        let raw = "```\n{\"intent\":\"other\",\"confidence\":0.0}\n```";
        let parsed: Classification = parse_lenient(raw).unwrap();
        assert_eq!(parsed.intent, "other");
    }

    #[test]
    fn parses_unfenced_json_directly() {
        let raw = "{\"intent\":\"billing\",\"confidence\":0.5}";
        let parsed: Classification = parse_lenient(raw).unwrap();
        assert_eq!(parsed.intent, "billing");
    }

    #[test]
    fn returns_none_on_garbage_input() {
        let raw = "sorry, I can't do that";
        let parsed: Option<Classification> = parse_lenient(raw);
        assert!(parsed.is_none());
    }

    #[test]
    fn returns_none_on_schema_mismatch() {
        let raw = "{\"foo\":\"bar\"}";
        let parsed: Option<Classification> = parse_lenient(raw);
        assert!(parsed.is_none());
    }
}
