//! Serialization of record sets into downloadable CSV or JSON.
//!
//! Both formats skip records whose AI payload fails to parse. CSV fields
//! are written as-is without quoting, so free text containing commas will
//! shift columns; existing consumers read the files in this form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::classifier::classify;
use super::parser::parse_outcome;
use super::types::HistoryItem;
use crate::error::{HistoryError, HistoryResult};
use crate::storage::VerificationRecord;

pub const CSV_HEADER: &str = "ID,Timestamp,Product ID,Category,Verification Result,Overall Confidence,Label Match,Label Confidence,Overview Match,Overview Confidence,AI Model";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Parse a format tag, case-insensitively. `pdf` is recognized but
    /// not implemented, and is rejected like any unknown tag.
    pub fn parse(raw: &str) -> HistoryResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(HistoryError::UnsupportedFormat {
                format: raw.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// File extension for the format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A serialized export ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedExport {
    pub format: ExportFormat,
    pub content: String,
    /// Records actually written; parse failures are not counted.
    pub record_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    exported_at: DateTime<Utc>,
    total_records: usize,
    records: &'a [HistoryItem],
}

/// Render records in the requested format.
pub fn render(
    records: &[VerificationRecord],
    format: ExportFormat,
    exported_at: DateTime<Utc>,
) -> HistoryResult<RenderedExport> {
    let rendered = match format {
        ExportFormat::Csv => {
            let (content, record_count) = render_csv(records);
            RenderedExport {
                format,
                content,
                record_count,
            }
        }
        ExportFormat::Json => {
            let (content, record_count) = render_json(records, exported_at)?;
            RenderedExport {
                format,
                content,
                record_count,
            }
        }
    };

    debug!(
        format = %format,
        input = records.len(),
        written = rendered.record_count,
        "Export rendered"
    );
    Ok(rendered)
}

/// CSV table with a fixed header; returns the content and row count.
pub fn render_csv(records: &[VerificationRecord]) -> (String, usize) {
    let mut lines = vec![CSV_HEADER.to_string()];

    for record in records {
        let outcome = match parse_outcome(&record.ai_response) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Skipping record in CSV export");
                continue;
            }
        };

        lines.push(format!(
            "{},{},{},{},{},{:.3},{},{:.3},{},{:.3},{}",
            record.id,
            record.timestamp,
            record.product_id,
            record.product_category,
            classify(&outcome),
            outcome.overall_confidence(),
            outcome.label_result(),
            outcome.label_score(),
            outcome.overview_result(),
            outcome.overview_score(),
            record.ai_response.model,
        ));
    }

    let count = lines.len() - 1;
    (lines.join("\n"), count)
}

/// Pretty-printed `{exportedAt, totalRecords, records}` document.
pub fn render_json(
    records: &[VerificationRecord],
    exported_at: DateTime<Utc>,
) -> HistoryResult<(String, usize)> {
    let items: Vec<HistoryItem> = records
        .iter()
        .filter_map(|record| match parse_outcome(&record.ai_response) {
            Ok(outcome) => Some(HistoryItem::from_outcome(record, &outcome, classify(&outcome))),
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Skipping record in JSON export");
                None
            }
        })
        .collect();

    let document = JsonExport {
        exported_at,
        total_records: items.len(),
        records: &items,
    };

    Ok((serde_json::to_string_pretty(&document)?, items.len()))
}

/// Artifact file name: `history-export-YYYYMMDD-HHMMSS-<id>.<ext>`.
pub fn artifact_filename(format: ExportFormat, at: DateTime<Utc>) -> String {
    let short_id = Uuid::new_v4().simple().to_string();
    format!(
        "history-export-{}-{}.{}",
        at.format("%Y%m%d-%H%M%S"),
        &short_id[..8],
        format.extension()
    )
}

/// Human-readable size in kilobytes, one decimal place.
pub fn format_file_size(bytes: usize) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}
