use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{TokenUsage, VerificationRecord};

/// Raw query parameters of a request.
pub type QueryParams = HashMap<String, String>;

/// Explanation attached to items whose AI payload could not be parsed.
pub const PARSE_FAILURE_EXPLANATION: &str = "Failed to parse AI response";

/// Verdict reported when a payload carries none.
pub const UNKNOWN_VERDICT: &str = "unknown";

// ============================================================================
// Parsed outcome
// ============================================================================

/// Raw yes/no verdict produced by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    /// Any other string, kept verbatim.
    Other(String),
}

impl Verdict {
    /// Interpret a raw verdict string. Matching is exact.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "yes" => Verdict::Yes,
            "no" => Verdict::No,
            other => Verdict::Other(other.to_string()),
        }
    }

    /// The verdict as written by the model.
    pub fn as_str(&self) -> &str {
        match self {
            Verdict::Yes => "yes",
            Verdict::No => "no",
            Verdict::Other(raw) => raw,
        }
    }
}

/// Outcome reconstructed from an AI response payload.
///
/// Every field is optional: producers write partial payloads, and a field
/// with the wrong type is treated as absent rather than failing the parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationOutcome {
    pub label_verdict: Option<Verdict>,
    pub label_confidence: Option<f64>,
    pub label_explanation: Option<String>,
    pub overview_verdict: Option<Verdict>,
    pub overview_confidence: Option<f64>,
    pub overview_explanation: Option<String>,
}

impl VerificationOutcome {
    /// Label confidence, 0 when absent.
    pub fn label_score(&self) -> f64 {
        self.label_confidence.unwrap_or(0.0)
    }

    /// Overview confidence, 0 when absent.
    pub fn overview_score(&self) -> f64 {
        self.overview_confidence.unwrap_or(0.0)
    }

    /// Mean of the label and overview confidences.
    pub fn overall_confidence(&self) -> f64 {
        (self.label_score() + self.overview_score()) / 2.0
    }

    pub fn label_matched(&self) -> bool {
        self.label_verdict == Some(Verdict::Yes)
    }

    pub fn overview_matched(&self) -> bool {
        self.overview_verdict == Some(Verdict::Yes)
    }

    /// Label verdict string, `"unknown"` when absent.
    pub fn label_result(&self) -> &str {
        self.label_verdict
            .as_ref()
            .map(Verdict::as_str)
            .unwrap_or(UNKNOWN_VERDICT)
    }

    /// Overview verdict string, `"unknown"` when absent.
    pub fn overview_result(&self) -> &str {
        self.overview_verdict
            .as_ref()
            .map(Verdict::as_str)
            .unwrap_or(UNKNOWN_VERDICT)
    }
}

/// Three-way verdict derived from an outcome. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Correct,
    Incorrect,
    Uncertain,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Correct => "CORRECT",
            Classification::Incorrect => "INCORRECT",
            Classification::Uncertain => "UNCERTAIN",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// List view
// ============================================================================

/// Label or overview match as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub result: String,
    pub confidence: f64,
    pub explanation: String,
}

impl MatchResult {
    fn unparsed() -> Self {
        Self {
            result: UNKNOWN_VERDICT.to_string(),
            confidence: 0.0,
            explanation: PARSE_FAILURE_EXPLANATION.to_string(),
        }
    }
}

/// Presentation projection of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub product_id: String,
    pub product_category: String,
    pub uploaded_label_image_key: String,
    pub uploaded_overview_image_key: String,
    pub verification_result: Classification,
    pub overall_confidence: f64,
    pub label_match: MatchResult,
    pub overview_match: MatchResult,
    pub ai_model: String,
    pub token_usage: TokenUsage,
}

impl HistoryItem {
    /// Build an item from a successfully parsed record.
    pub fn from_outcome(
        record: &VerificationRecord,
        outcome: &VerificationOutcome,
        classification: Classification,
    ) -> Self {
        Self {
            label_match: MatchResult {
                result: outcome.label_result().to_string(),
                confidence: outcome.label_score(),
                explanation: outcome.label_explanation.clone().unwrap_or_default(),
            },
            overview_match: MatchResult {
                result: outcome.overview_result().to_string(),
                confidence: outcome.overview_score(),
                explanation: outcome.overview_explanation.clone().unwrap_or_default(),
            },
            verification_result: classification,
            overall_confidence: outcome.overall_confidence(),
            ..Self::placeholder(record)
        }
    }

    /// Degraded item for a record whose payload failed to parse.
    pub fn placeholder(record: &VerificationRecord) -> Self {
        Self {
            id: record.id.clone(),
            timestamp: record_timestamp(record),
            product_id: record.product_id.clone(),
            product_category: record.product_category.clone(),
            uploaded_label_image_key: record.uploaded_label_image_key.clone(),
            uploaded_overview_image_key: record.uploaded_overview_image_key.clone(),
            verification_result: Classification::Uncertain,
            overall_confidence: 0.0,
            label_match: MatchResult::unparsed(),
            overview_match: MatchResult::unparsed(),
            ai_model: record.ai_response.model.clone(),
            token_usage: record.ai_response.usage,
        }
    }
}

/// Parse a stored timestamp; zone-less values are taken as UTC.
pub fn parse_record_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

fn record_timestamp(record: &VerificationRecord) -> DateTime<Utc> {
    parse_record_timestamp(&record.timestamp).unwrap_or_else(|| {
        warn!(
            record_id = %record.id,
            timestamp = %record.timestamp,
            "Failed to parse record timestamp, using current time"
        );
        Utc::now()
    })
}

/// Page block returned with the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub page_size: usize,
    pub total_records: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

// ============================================================================
// Summary view
// ============================================================================

/// Aggregate statistics over a date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    pub total_verifications: usize,
    /// Percentage of CORRECT records.
    pub success_rate: f64,
    pub average_confidence: f64,
    pub category_breakdown: BTreeMap<String, CategoryStats>,
    #[serde(rename = "aiModelUsage")]
    pub ai_model_usage: BTreeMap<String, ModelStats>,
    pub confidence_distribution: ConfidenceStats,
    pub label_accuracy: AccuracyStats,
    pub overview_accuracy: AccuracyStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub count: usize,
    pub success_rate: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub verifications: usize,
    pub avg_input_tokens: u64,
    pub avg_output_tokens: u64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub high: ConfidenceBucket,
    pub medium: ConfidenceBucket,
    pub low: ConfidenceBucket,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBucket {
    pub range: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyStats {
    pub average_confidence: f64,
    pub success_rate: f64,
}

// ============================================================================
// Export view
// ============================================================================

/// Description of a generated export artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub format: String,
    pub record_count: usize,
    pub file_size: String,
}

// ============================================================================
// Envelope
// ============================================================================

/// The three history operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    List,
    Summary,
    Export,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::List => write!(f, "list"),
            View::Summary => write!(f, "summary"),
            View::Export => write!(f, "export"),
        }
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(View::List),
            "summary" => Ok(View::Summary),
            "export" => Ok(View::Export),
            _ => Err(format!(
                "Invalid 'view' parameter: {}. Valid values: list, summary, export",
                s
            )),
        }
    }
}

/// Payload of a history response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryData {
    List(Vec<HistoryItem>),
    Summary(Box<SummaryData>),
    Export(ExportData),
}

/// Inclusive time window reported with a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Response metadata; which fields are set depends on the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_filters: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// Success envelope: `{view, data, pagination?, metadata}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub view: View,
    pub data: HistoryData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub metadata: ResponseMetadata,
}
