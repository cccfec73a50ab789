//! Reconstruction of a [`VerificationOutcome`] from an AI response.
//!
//! Producers write the payload either as a JSON document inside a string
//! (usually wrapped in a markdown code fence) or as an already-decoded
//! key/value map. Both encodings funnel into the same per-field reader.

use serde_json::{Map, Value};

use super::types::{Verdict, VerificationOutcome};
use crate::error::ParseError;
use crate::storage::{AiResponse, ContentPayload};

pub const LABEL_VERDICT_KEY: &str = "matchLabelToReference";
pub const LABEL_CONFIDENCE_KEY: &str = "matchLabelToReference_confidence";
pub const LABEL_EXPLANATION_KEY: &str = "label_explanation";
pub const OVERVIEW_VERDICT_KEY: &str = "matchOverviewToReference";
pub const OVERVIEW_CONFIDENCE_KEY: &str = "matchOverviewToReference_confidence";
pub const OVERVIEW_EXPLANATION_KEY: &str = "overview_explanation";

/// Parse the verification outcome carried by the first content block.
///
/// Fails only when there is no content, or when a string payload is not a
/// JSON object. Individual fields are read best-effort.
pub fn parse_outcome(response: &AiResponse) -> Result<VerificationOutcome, ParseError> {
    let first = response.content.first().ok_or(ParseError::EmptyContent)?;

    match &first.text {
        ContentPayload::Text(text) => {
            let body = strip_code_fence(text);
            let value: Value =
                serde_json::from_str(body).map_err(|e| ParseError::MalformedJson {
                    message: e.to_string(),
                })?;
            match value {
                Value::Object(map) => Ok(read_fields(&map)),
                other => Err(ParseError::MalformedJson {
                    message: format!("expected a JSON object, found {}", kind(&other)),
                }),
            }
        }
        ContentPayload::Mapped(map) => Ok(read_fields(map)),
        ContentPayload::Unrecognized(value) => Err(ParseError::MalformedJson {
            message: format!("unsupported payload type: {}", kind(value)),
        }),
    }
}

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.split_once('\n') {
        Some((_language, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn read_fields(map: &Map<String, Value>) -> VerificationOutcome {
    VerificationOutcome {
        label_verdict: read_verdict(map, LABEL_VERDICT_KEY),
        label_confidence: read_confidence(map, LABEL_CONFIDENCE_KEY),
        label_explanation: read_string(map, LABEL_EXPLANATION_KEY),
        overview_verdict: read_verdict(map, OVERVIEW_VERDICT_KEY),
        overview_confidence: read_confidence(map, OVERVIEW_CONFIDENCE_KEY),
        overview_explanation: read_string(map, OVERVIEW_EXPLANATION_KEY),
    }
}

fn read_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn read_verdict(map: &Map<String, Value>, key: &str) -> Option<Verdict> {
    map.get(key).and_then(Value::as_str).map(Verdict::from_raw)
}

/// Numbers (integer or float) and numeric strings are accepted; the
/// result is clamped to [0, 1].
fn read_confidence(map: &Map<String, Value>, key: &str) -> Option<f64> {
    let raw = match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    raw.is_finite().then(|| raw.clamp(0.0, 1.0))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "matchLabelToReference": "yes",
            "matchLabelToReference_confidence": 0.92,
            "label_explanation": "Logo and text match",
            "matchOverviewToReference": "no",
            "matchOverviewToReference_confidence": 0.4,
            "overview_explanation": "Handle differs"
        })
    }

    fn expected() -> VerificationOutcome {
        VerificationOutcome {
            label_verdict: Some(Verdict::Yes),
            label_confidence: Some(0.92),
            label_explanation: Some("Logo and text match".to_string()),
            overview_verdict: Some(Verdict::No),
            overview_confidence: Some(0.4),
            overview_explanation: Some("Handle differs".to_string()),
        }
    }

    fn mapped(value: Value) -> AiResponse {
        match value {
            Value::Object(map) => AiResponse::new("claude").with_mapped(map),
            _ => unreachable!("test payloads are objects"),
        }
    }

    #[test]
    fn test_parse_fenced_string_payload() {
        let text = format!("```json\n{}\n```", payload());
        let outcome = parse_outcome(&AiResponse::new("claude").with_text(text)).unwrap();
        assert_eq!(outcome, expected());
    }

    #[test]
    fn test_parse_plain_string_payload() {
        let outcome =
            parse_outcome(&AiResponse::new("claude").with_text(payload().to_string())).unwrap();
        assert_eq!(outcome, expected());
    }

    #[test]
    fn test_parse_mapped_payload() {
        let outcome = parse_outcome(&mapped(payload())).unwrap();
        assert_eq!(outcome, expected());
    }

    #[test]
    fn test_fenced_and_mapped_encodings_converge() {
        let fenced = AiResponse::new("claude").with_text(format!("```json\n{}\n```", payload()));
        assert_eq!(
            parse_outcome(&fenced).unwrap(),
            parse_outcome(&mapped(payload())).unwrap()
        );
    }

    #[test]
    fn test_empty_content_fails() {
        let err = parse_outcome(&AiResponse::new("claude")).unwrap_err();
        assert_eq!(err, ParseError::EmptyContent);
    }

    #[test]
    fn test_malformed_json_fails() {
        let err =
            parse_outcome(&AiResponse::new("claude").with_text("```json\n{not json\n```"))
                .unwrap_err();
        assert!(matches!(err, ParseError::MalformedJson { .. }));
    }

    #[test]
    fn test_non_object_json_fails() {
        let err = parse_outcome(&AiResponse::new("claude").with_text("[1, 2]")).unwrap_err();
        assert!(matches!(err, ParseError::MalformedJson { ref message } if message.contains("array")));
    }

    #[test]
    fn test_unrecognized_payload_fails() {
        let mut response = AiResponse::new("claude").with_text("x");
        response.content[0].text = ContentPayload::Unrecognized(json!(7));
        assert!(matches!(
            parse_outcome(&response),
            Err(ParseError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_partial_mapped_payload_is_legal() {
        let outcome = parse_outcome(&mapped(json!({"matchLabelToReference": "yes"}))).unwrap();
        assert_eq!(outcome.label_verdict, Some(Verdict::Yes));
        assert!(outcome.label_confidence.is_none());
        assert!(outcome.overview_verdict.is_none());
        assert_eq!(outcome.overview_result(), "unknown");
        assert_eq!(outcome.overall_confidence(), 0.0);
    }

    #[test]
    fn test_field_type_mismatch_does_not_abort() {
        let outcome = parse_outcome(&mapped(json!({
            "matchLabelToReference": 1,
            "matchLabelToReference_confidence": "high",
            "label_explanation": ["not", "a", "string"],
            "matchOverviewToReference": "yes",
            "matchOverviewToReference_confidence": 0.8,
        })))
        .unwrap();

        assert!(outcome.label_verdict.is_none());
        assert!(outcome.label_confidence.is_none());
        assert!(outcome.label_explanation.is_none());
        assert_eq!(outcome.overview_verdict, Some(Verdict::Yes));
        assert_eq!(outcome.overview_confidence, Some(0.8));
    }

    #[test]
    fn test_confidence_integer_and_string_forms() {
        let outcome = parse_outcome(&mapped(json!({
            "matchLabelToReference_confidence": 1,
            "matchOverviewToReference_confidence": "0.75",
        })))
        .unwrap();
        assert_eq!(outcome.label_confidence, Some(1.0));
        assert_eq!(outcome.overview_confidence, Some(0.75));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let outcome = parse_outcome(&mapped(json!({
            "matchLabelToReference_confidence": 1.7,
            "matchOverviewToReference_confidence": -0.2,
        })))
        .unwrap();
        assert_eq!(outcome.label_confidence, Some(1.0));
        assert_eq!(outcome.overview_confidence, Some(0.0));
    }

    #[test]
    fn test_other_verdict_kept_verbatim() {
        let outcome =
            parse_outcome(&mapped(json!({"matchLabelToReference": "partial"}))).unwrap();
        assert_eq!(outcome.label_result(), "partial");
        assert!(!outcome.label_matched());
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```json\n{\"a\":1}\n```  \n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }
}
