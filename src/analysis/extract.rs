//! # Model Response Extraction
//!
//! Recovers exactly one JSON object from the unconstrained text a model
//! returns. Even with an explicit output schema in the prompt, replies
//! routinely arrive wrapped in prose, markdown fences, or both.
//!
//! Extraction is an explicit ordered list of strategies; the first one that
//! yields a JSON object wins:
//!
//! 1. Parse the entire reply directly
//! 2. Find the first brace-balanced span (depth tracked character by
//!    character) and parse it
//! 3. Find a fenced code block and parse its contents
//!
//! Depth-tracked span extraction is required: first-`{`-to-last-`}` slicing
//! breaks when trailing prose contains its own braces, and a non-greedy
//! regex breaks on nested objects. If every strategy fails the extractor
//! reports an error carrying a bounded prefix of the reply for diagnostics;
//! it never guesses or returns a partial object.

use serde_json::Value;

/// Upper bound on how much of the raw reply is echoed in extraction errors.
const ERROR_PREVIEW_CHARS: usize = 200;

/// No strategy recovered a JSON object from the reply.
#[derive(Debug, thiserror::Error)]
#[error("could not extract JSON from model response: {preview}")]
pub struct ExtractError {
    preview: String,
}

type Strategy = fn(&str) -> Option<Value>;

/// Extraction strategies in priority order.
const STRATEGIES: [Strategy; 3] = [parse_direct, parse_balanced_span, parse_fenced_block];

/// Extract a single JSON object from raw model output.
pub fn extract_json(raw: &str) -> Result<Value, ExtractError> {
    for strategy in STRATEGIES {
        if let Some(value) = strategy(raw) {
            return Ok(value);
        }
    }

    Err(ExtractError {
        preview: raw.chars().take(ERROR_PREVIEW_CHARS).collect(),
    })
}

/// Strategy 1: the whole reply is the object.
fn parse_direct(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw.trim())
        .ok()
        .filter(|value| value.is_object())
}

/// Strategy 2: first brace-balanced span that parses as an object.
///
/// Spans that balance but fail to parse (a schema example with unquoted
/// placeholders, say) are skipped whole and the scan resumes after them,
/// so an example preceding the real payload does not sink extraction.
fn parse_balanced_span(raw: &str) -> Option<Value> {
    let mut search = raw;

    while let Some((span, end)) = balanced_object_span(search) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            if value.is_object() {
                return Some(value);
            }
        }
        search = &search[end..];
    }

    None
}

/// Strategy 3: contents of the first ``` fence (optional "json" tag).
fn parse_fenced_block(raw: &str) -> Option<Value> {
    let open = raw.find("```")?;
    let body = &raw[open + 3..];
    let body = body.strip_prefix("json").unwrap_or(body);
    let close = body.find("```")?;
    let body = body[..close].trim();

    // The fence may itself mix prose with the object
    serde_json::from_str::<Value>(body)
        .ok()
        .filter(|value| value.is_object())
        .or_else(|| parse_balanced_span(body))
}

/// Locate the first balanced `{...}` span, tracking nesting depth character
/// by character. Returns the span and the index just past it.
fn balanced_object_span(text: &str) -> Option<(&str, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;

    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some((&text[start..end], end));
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = r#"{"scam_score": 0.82, "verdict": "SCAM", "signals": [{"category": "URGENCY", "detail": "act now", "severity": "high"}]}"#;

    fn target_value() -> Value {
        serde_json::from_str(TARGET).unwrap()
    }

    #[test]
    fn test_direct_json() {
        assert_eq!(extract_json(TARGET).unwrap(), target_value());
    }

    #[test]
    fn test_direct_json_with_whitespace() {
        let raw = format!("\n  {}\n", TARGET);
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_fenced_code_block() {
        let raw = format!("Here is my analysis:\n```json\n{}\n```\nLet me know!", TARGET);
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let raw = format!("```\n{}\n```", TARGET);
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let raw = format!("After careful analysis: {} That is my conclusion.", TARGET);
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_nested_objects_extract_whole_span() {
        // The target itself contains nested objects; naive non-greedy
        // matching would stop at the first closing brace
        let raw = format!("Result: {} and some trailing text with a brace }}", TARGET);
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_schema_example_preceding_real_object() {
        // The malformed example balances but does not parse; the scan must
        // move past it to the real payload
        let raw = format!(
            "The expected shape is {{\"scam_score\": <float>, \"signals\": [{{\"category\": \"<dimension>\"}}]}}.\nHere is the result: {}",
            TARGET
        );
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_prose_braces_after_object() {
        let raw = format!("{}\n\nNote: the {{signals}} array lists evidence.", TARGET);
        assert_eq!(extract_json(&raw).unwrap(), target_value());
    }

    #[test]
    fn test_array_reply_is_not_an_object() {
        let err = extract_json("[1, 2, 3]").unwrap_err();
        assert!(err.to_string().contains("[1, 2, 3]"));
    }

    #[test]
    fn test_no_json_fails_with_preview() {
        let err = extract_json("I am unable to analyze this audio.").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("could not extract JSON"));
        assert!(message.contains("I am unable to analyze"));
    }

    #[test]
    fn test_error_preview_is_bounded() {
        let raw = "x".repeat(5000);
        let err = extract_json(&raw).unwrap_err();
        assert!(err.to_string().len() < 300);
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        assert!(extract_json(r#"{"scam_score": 0.5, "verdict": "#).is_err());
    }
}
