//! Unit tests for record types, payload decoding and scan predicates.

use super::*;
use serde_json::json;

fn record(id: &str, timestamp: &str, product: &str, category: &str) -> VerificationRecord {
    VerificationRecord::new(id, timestamp, product, category, AiResponse::new("claude"))
}

// ============================================================================
// Record model tests
// ============================================================================

#[test]
fn test_record_new() {
    let rec = record("r1", "2024-05-01T10:00:00Z", "P-1", "REF");
    assert_eq!(rec.id, "r1");
    assert_eq!(rec.product_category, "REF");
    assert!(rec.uploaded_label_image_key.is_empty());
    assert!(rec.uploaded_reference_image_key.is_none());
}

#[test]
fn test_record_with_images() {
    let rec = record("r1", "2024-05-01T10:00:00Z", "P-1", "REF")
        .with_images("label.jpg", "overview.jpg")
        .with_reference_image("ref.jpg");
    assert_eq!(rec.uploaded_label_image_key, "label.jpg");
    assert_eq!(rec.uploaded_overview_image_key, "overview.jpg");
    assert_eq!(rec.uploaded_reference_image_key.as_deref(), Some("ref.jpg"));
}

#[test]
fn test_record_deserializes_legacy_response_key() {
    let raw = json!({
        "id": "r1",
        "timestamp": "2024-05-01T10:00:00Z",
        "productId": "P-1",
        "productCategory": "WM",
        "uploadedLabelImageKey": "l.jpg",
        "uploadedOverviewImageKey": "o.jpg",
        "bedrockResponse": {
            "model": "claude-3",
            "usage": {"input_tokens": 100, "output_tokens": 20},
            "content": [{"type": "text", "text": "{}"}],
            "stop_reason": "end_turn"
        }
    });

    let rec: VerificationRecord = serde_json::from_value(raw).unwrap();
    assert_eq!(rec.ai_response.model, "claude-3");
    assert_eq!(rec.ai_response.usage.input_tokens, 100);
    assert_eq!(rec.ai_response.usage.cache_read_input_tokens, 0);
    assert_eq!(rec.ai_response.stop_reason.as_deref(), Some("end_turn"));
}

#[test]
fn test_content_payload_string_variant() {
    let item: ContentItem = serde_json::from_value(json!({"type": "text", "text": "abc"})).unwrap();
    assert_eq!(item.text, ContentPayload::Text("abc".to_string()));
}

#[test]
fn test_content_payload_mapped_variant() {
    let item: ContentItem = serde_json::from_value(json!({
        "type": "text",
        "text": {"matchLabelToReference": "yes"}
    }))
    .unwrap();
    assert!(matches!(item.text, ContentPayload::Mapped(ref m) if m.contains_key("matchLabelToReference")));
}

#[test]
fn test_content_payload_unrecognized_variant() {
    let item: ContentItem = serde_json::from_value(json!({"type": "text", "text": 42})).unwrap();
    assert_eq!(item.text, ContentPayload::Unrecognized(json!(42)));

    let missing: ContentItem = serde_json::from_value(json!({"type": "text"})).unwrap();
    assert_eq!(missing.text, ContentPayload::Unrecognized(Value::Null));
}

#[test]
fn test_ai_response_serializes_camel_record_and_snake_usage() {
    let rec = record("r1", "2024-05-01T10:00:00Z", "P-1", "REF");
    let value = serde_json::to_value(&rec).unwrap();
    assert!(value.get("productId").is_some());
    assert!(value.get("aiResponse").is_some());
    assert!(value["aiResponse"]["usage"].get("input_tokens").is_some());
    assert!(value.get("uploadedReferenceImageKey").is_none());
}

// ============================================================================
// ScanFilter tests
// ============================================================================

#[test]
fn test_empty_filter_matches_everything() {
    let filter = ScanFilter::all();
    assert!(filter.is_empty());
    assert!(filter.matches(&record("r1", "2024-01-01T00:00:00Z", "P", "REF")));
    assert_eq!(filter.expression(), "");
}

#[test]
fn test_equals_condition() {
    let filter = ScanFilter {
        conditions: vec![Condition {
            field: RecordField::ProductCategory,
            predicate: Predicate::Equals(Operand::new(":category", "REF")),
        }],
        ..Default::default()
    };

    assert!(filter.matches(&record("r1", "2024-01-01T00:00:00Z", "P", "REF")));
    assert!(!filter.matches(&record("r2", "2024-01-01T00:00:00Z", "P", "TV")));
    assert_eq!(filter.expression(), "productCategory = :category");
}

#[test]
fn test_range_conditions_are_inclusive() {
    let mut attribute_names = BTreeMap::new();
    attribute_names.insert("#ts".to_string(), "timestamp".to_string());
    let filter = ScanFilter {
        conditions: vec![Condition {
            field: RecordField::Timestamp,
            predicate: Predicate::Between(
                Operand::new(":dateFrom", "2024-01-01T00:00:00Z"),
                Operand::new(":dateTo", "2024-01-31T00:00:00Z"),
            ),
        }],
        attribute_names,
    };

    assert!(filter.matches(&record("a", "2024-01-01T00:00:00Z", "P", "REF")));
    assert!(filter.matches(&record("b", "2024-01-31T00:00:00Z", "P", "REF")));
    assert!(!filter.matches(&record("c", "2024-02-01T00:00:00Z", "P", "REF")));
    assert_eq!(filter.expression(), "#ts BETWEEN :dateFrom AND :dateTo");
}

#[test]
fn test_at_least_and_at_most() {
    let at_least = Condition {
        field: RecordField::Timestamp,
        predicate: Predicate::AtLeast(Operand::new(":dateFrom", "2024-03-01")),
    };
    let at_most = Condition {
        field: RecordField::Timestamp,
        predicate: Predicate::AtMost(Operand::new(":dateTo", "2024-03-01")),
    };
    let early = record("a", "2024-02-28T00:00:00Z", "P", "REF");
    let late = record("b", "2024-03-02T00:00:00Z", "P", "REF");

    assert!(!at_least.matches(&early));
    assert!(at_least.matches(&late));
    assert!(at_most.matches(&early));
    assert!(!at_most.matches(&late));
}

#[test]
fn test_record_field_attribute_names() {
    assert_eq!(RecordField::ProductId.attribute(), "productId");
    assert_eq!(RecordField::ProductCategory.attribute(), "productCategory");
    assert_eq!(RecordField::Timestamp.attribute(), "timestamp");
}
