//! Extraction of text and JSON from model response envelopes
//!
//! The service answers in one of two shapes: a top-level `output_text`
//! string, or a nested `output[].content[]` list of typed blocks. Neither
//! shape may be assumed.

use serde::de::DeserializeOwned;
use serde_json::Value;
use slated_core::{Result, SlatedError};

/// Collect the output text of a response envelope.
///
/// Prefers a top-level `output_text` string; otherwise concatenates, with
/// newline separators, every `text` field inside `output[*].content[*]`
/// blocks of type `output_text`. An absent envelope yields an empty string.
pub fn extract_output_text(envelope: &Value) -> String {
    if let Some(text) = envelope["output_text"].as_str() {
        return text.to_string();
    }

    let mut parts = Vec::new();
    if let Some(output) = envelope["output"].as_array() {
        for item in output {
            if let Some(content) = item["content"].as_array() {
                for block in content {
                    if block["type"].as_str() == Some("output_text") {
                        if let Some(text) = block["text"].as_str() {
                            parts.push(text);
                        }
                    }
                }
            }
        }
    }
    parts.join("\n")
}

/// Strip a surrounding markdown code fence.
///
/// When the text starts with triple backticks, everything up to the first
/// newline and everything from the last triple backticks onward is dropped.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => "",
    };
    let body = match body.rfind("```") {
        Some(i) => &body[..i],
        None => body,
    };
    body.trim().to_string()
}

/// Extract the output text, strip fences, and decode as JSON into `T`
pub fn parse_json_from_output_text<T: DeserializeOwned>(envelope: &Value) -> Result<T> {
    let text = strip_code_fences(&extract_output_text(envelope));
    serde_json::from_str(&text)
        .map_err(|e| SlatedError::Parse(format!("{} in output: {:.200}", e, text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_extract_top_level_output_text() {
        let envelope = json!({"output_text": "hello"});
        assert_eq!(extract_output_text(&envelope), "hello");
    }

    #[test]
    fn test_extract_nested_blocks() {
        let envelope = json!({
            "output": [
                {"content": [
                    {"type": "output_text", "text": "first"},
                    {"type": "reasoning", "text": "skipped"},
                ]},
                {"content": [{"type": "output_text", "text": "second"}]},
            ]
        });
        assert_eq!(extract_output_text(&envelope), "first\nsecond");
    }

    #[test]
    fn test_extract_absent_is_empty() {
        assert_eq!(extract_output_text(&json!({})), "");
        assert_eq!(extract_output_text(&json!({"output": "not an array"})), "");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\nplain\n```"), "plain");
        // Unfenced text passes through
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        // Unterminated fence keeps the body
        assert_eq!(strip_code_fences("```html\n<p>x</p>"), "<p>x</p>");
    }

    #[derive(Deserialize)]
    struct Verdict {
        ok: bool,
    }

    #[test]
    fn test_parse_json_from_fenced_output() {
        let envelope = json!({"output_text": "```json\n{\"ok\": true}\n```"});
        let verdict: Verdict = parse_json_from_output_text(&envelope).unwrap();
        assert!(verdict.ok);
    }

    #[test]
    fn test_parse_failure_is_parse_error() {
        let envelope = json!({"output_text": "not json at all"});
        let result: Result<Verdict> = parse_json_from_output_text(&envelope);
        assert!(matches!(result, Err(SlatedError::Parse(_))));
    }
}
