//! Strict JSON extraction from model text output.
//!
//! The extraction pipeline asks the model for a JSON-only response, but
//! models routinely wrap the object in a fenced code block or prose.
//! [`extract_json`] tolerates the wrapping while keeping the *shape* check
//! strict: the candidate must deserialize into the requested type or the
//! caller gets `None` and treats the run as failed.

/// Extract the first valid JSON value of type `T` from an LLM response.
///
/// Strategy 1 looks for a fenced ```json block; strategy 2 falls back to
/// the outermost `{...}` span. Returns `None` when neither yields a value
/// that deserializes into `T`.
pub fn extract_json<T: serde::de::DeserializeOwned>(response: &str) -> Option<T> {
    // Strategy 1: fenced ```json ... ``` blocks.
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(json_start) = after_fence.find(|c: char| !c.is_whitespace()) {
            let json_body = &after_fence[json_start..];
            if let Some(fence_end) = json_body.find("```") {
                let json_str = json_body[..fence_end].trim();
                if let Ok(val) = serde_json::from_str(json_str) {
                    return Some(val);
                }
            }
        }
    }

    // Strategy 2: bare JSON object, first '{' to the last '}'.
    let trimmed = response.trim();
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                let candidate = &trimmed[start..=end];
                if let Ok(val) = serde_json::from_str(candidate) {
                    return Some(val);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Extraction {
        label: String,
        #[serde(default)]
        items: Vec<String>,
    }

    #[test]
    fn extract_fenced_json() {
        let raw = "Here you go:\n```json\n{\"label\":\"calm\",\"items\":[\"a\"]}\n```\nanything else?";
        let out: Extraction = extract_json(raw).unwrap();
        assert_eq!(out.label, "calm");
        assert_eq!(out.items, vec!["a"]);
    }

    #[test]
    fn extract_bare_json_with_surrounding_text() {
        let raw = "preamble {\"label\":\"steady\"} epilogue";
        let out: Extraction = extract_json(raw).unwrap();
        assert_eq!(out.label, "steady");
    }

    #[test]
    fn fenced_takes_precedence_over_bare() {
        let raw = "{\"label\":\"wrong\"}\n```json\n{\"label\":\"right\"}\n```";
        let out: Extraction = extract_json(raw).unwrap();
        assert_eq!(out.label, "right");
    }

    #[test]
    fn shape_mismatch_returns_none() {
        // valid JSON, missing the required field
        assert!(extract_json::<Extraction>("{\"other\":1}").is_none());
    }

    #[test]
    fn plain_text_returns_none() {
        assert!(extract_json::<Extraction>("no json here").is_none());
        assert!(extract_json::<Extraction>("").is_none());
    }

    #[test]
    fn malformed_json_in_fence_returns_none() {
        let raw = "```json\n{not valid json}\n```";
        assert!(extract_json::<Extraction>(raw).is_none());
    }

    #[test]
    fn nested_braces_survive() {
        let raw = r#"{"label":"x","items":["{inner}"]}"#;
        let out: Extraction = extract_json(raw).unwrap();
        assert_eq!(out.items, vec!["{inner}"]);
    }
}
