//! Storage layer for verification records.
//!
//! This module defines the record model written by the verification
//! pipeline, the predicate language the history core uses to scan it,
//! and the [`RecordStore`] trait with its SQLite implementation.

mod import;
mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use import::{import_records, ImportSummary};
pub use sqlite::SqliteStorage;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageResult;

/// One AI-assisted label/overview matching result.
///
/// Records are written once by the verification pipeline and are
/// read-only to everything in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    /// Externally assigned unique identifier.
    pub id: String,
    /// ISO-8601 timestamp; fixed width, so lexical order is time order.
    pub timestamp: String,
    /// Product identifier.
    pub product_id: String,
    /// Product category code (e.g. "REF", "WM", "TV").
    pub product_category: String,
    /// Object key of the uploaded label image.
    #[serde(default)]
    pub uploaded_label_image_key: String,
    /// Object key of the uploaded overview image.
    #[serde(default)]
    pub uploaded_overview_image_key: String,
    /// Object key of the reference image, when one was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_reference_image_key: Option<String>,
    /// The raw model response embedded in the record.
    #[serde(alias = "bedrockResponse")]
    pub ai_response: AiResponse,
}

/// Model response as stored alongside a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    /// Provider-assigned message id.
    #[serde(default)]
    pub id: String,
    /// Response object type.
    #[serde(default, rename = "type")]
    pub response_type: String,
    /// Author role of the message.
    #[serde(default)]
    pub role: String,
    /// Model name.
    #[serde(default)]
    pub model: String,
    /// Why generation stopped.
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token counters.
    #[serde(default)]
    pub usage: TokenUsage,
    /// Content blocks; the first carries the verification payload.
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

/// Token usage counters reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// A single content block of an AI response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Block type, normally "text".
    #[serde(default, rename = "type")]
    pub item_type: String,
    /// The verification payload in one of its observed encodings.
    #[serde(default)]
    pub text: ContentPayload,
}

/// The two payload encodings written by different producers.
///
/// Older producers store a JSON document as a string (often inside a
/// markdown code fence); newer ones store the decoded key/value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPayload {
    /// JSON-encoded string, possibly fenced.
    Text(String),
    /// Already-structured key/value payload.
    Mapped(Map<String, Value>),
    /// Anything else (numbers, arrays, null).
    Unrecognized(Value),
}

impl Default for ContentPayload {
    fn default() -> Self {
        ContentPayload::Unrecognized(Value::Null)
    }
}

// ============================================================================
// Scan predicates
// ============================================================================

/// Record attributes that can be used in a scan predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    /// `productId`
    ProductId,
    /// `productCategory`
    ProductCategory,
    /// `timestamp`
    Timestamp,
}

impl RecordField {
    /// Attribute name as it appears on the wire.
    pub fn attribute(&self) -> &'static str {
        match self {
            RecordField::ProductId => "productId",
            RecordField::ProductCategory => "productCategory",
            RecordField::Timestamp => "timestamp",
        }
    }

    /// Read the attribute from a record.
    pub fn value_of<'a>(&self, record: &'a VerificationRecord) -> &'a str {
        match self {
            RecordField::ProductId => &record.product_id,
            RecordField::ProductCategory => &record.product_category,
            RecordField::Timestamp => &record.timestamp,
        }
    }
}

/// A named value bound into a predicate (`:dateFrom` -> `2024-01-01T00:00:00Z`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operand {
    pub placeholder: String,
    pub value: String,
}

impl Operand {
    /// Create an operand.
    pub fn new(placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            value: value.into(),
        }
    }
}

/// Comparison applied to a single field. Comparisons are lexical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Equals(Operand),
    AtLeast(Operand),
    AtMost(Operand),
    /// Inclusive on both ends.
    Between(Operand, Operand),
}

/// One condition of a scan filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: RecordField,
    pub predicate: Predicate,
}

impl Condition {
    /// Whether the record satisfies this condition.
    pub fn matches(&self, record: &VerificationRecord) -> bool {
        let actual = self.field.value_of(record);
        match &self.predicate {
            Predicate::Equals(op) => actual == op.value,
            Predicate::AtLeast(op) => actual >= op.value.as_str(),
            Predicate::AtMost(op) => actual <= op.value.as_str(),
            Predicate::Between(low, high) => {
                actual >= low.value.as_str() && actual <= high.value.as_str()
            }
        }
    }
}

/// Conjunction of conditions understood by a [`RecordStore`].
///
/// An empty filter matches every record. `attribute_names` carries the
/// aliases (`#ts` -> `timestamp`) used when rendering the expression for
/// fields whose names collide with reserved words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub conditions: Vec<Condition>,
    pub attribute_names: BTreeMap<String, String>,
}

impl ScanFilter {
    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// True when no conditions are present.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the filter in-process.
    pub fn matches(&self, record: &VerificationRecord) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// Render the filter as a readable expression, used for logging.
    pub fn expression(&self) -> String {
        self.conditions
            .iter()
            .map(|c| {
                let name = self.name_for(c.field);
                match &c.predicate {
                    Predicate::Equals(op) => format!("{} = {}", name, op.placeholder),
                    Predicate::AtLeast(op) => format!("{} >= {}", name, op.placeholder),
                    Predicate::AtMost(op) => format!("{} <= {}", name, op.placeholder),
                    Predicate::Between(low, high) => {
                        format!("{} BETWEEN {} AND {}", name, low.placeholder, high.placeholder)
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn name_for(&self, field: RecordField) -> String {
        self.attribute_names
            .iter()
            .find(|(_, attribute)| attribute.as_str() == field.attribute())
            .map(|(alias, _)| alias.clone())
            .unwrap_or_else(|| field.attribute().to_string())
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Access to the persisted verification records.
///
/// Scans return every matching record in no particular order; ordering
/// and pagination happen in-process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return all records matching the filter.
    async fn scan(&self, filter: &ScanFilter) -> StorageResult<Vec<VerificationRecord>>;

    /// Fetch a single record by id.
    async fn get_record(&self, id: &str) -> StorageResult<Option<VerificationRecord>>;

    /// Persist a new record.
    async fn put_record(&self, record: &VerificationRecord) -> StorageResult<()>;
}

// ============================================================================
// Builders
// ============================================================================

impl VerificationRecord {
    /// Create a record with empty image keys.
    pub fn new(
        id: impl Into<String>,
        timestamp: impl Into<String>,
        product_id: impl Into<String>,
        product_category: impl Into<String>,
        ai_response: AiResponse,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            product_id: product_id.into(),
            product_category: product_category.into(),
            uploaded_label_image_key: String::new(),
            uploaded_overview_image_key: String::new(),
            uploaded_reference_image_key: None,
            ai_response,
        }
    }

    /// Set the label and overview image keys.
    pub fn with_images(mut self, label: impl Into<String>, overview: impl Into<String>) -> Self {
        self.uploaded_label_image_key = label.into();
        self.uploaded_overview_image_key = overview.into();
        self
    }

    /// Set the reference image key.
    pub fn with_reference_image(mut self, key: impl Into<String>) -> Self {
        self.uploaded_reference_image_key = Some(key.into());
        self
    }
}

impl AiResponse {
    /// Create a response for the given model with no content.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            response_type: "message".to_string(),
            role: "assistant".to_string(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set input/output token counts.
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage.input_tokens = input_tokens;
        self.usage.output_tokens = output_tokens;
        self
    }

    /// Append a content block carrying a string payload.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ContentItem {
            item_type: "text".to_string(),
            text: ContentPayload::Text(text.into()),
        });
        self
    }

    /// Append a content block carrying a structured payload.
    pub fn with_mapped(mut self, payload: Map<String, Value>) -> Self {
        self.content.push(ContentItem {
            item_type: "text".to_string(),
            text: ContentPayload::Mapped(payload),
        });
        self
    }

    /// Set the stop reason.
    pub fn with_stop_reason(mut self, reason: impl Into<String>) -> Self {
        self.stop_reason = Some(reason.into());
        self
    }
}
