use tracing::{debug, warn};

use super::{RecordStore, VerificationRecord};
use crate::error::StorageResult;

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Lines that were not valid records.
    pub rejected: usize,
}

/// Load newline-delimited `VerificationRecord` JSON into a store.
///
/// Undecodable lines are skipped with a warning; a store failure stops the
/// import.
pub async fn import_records(store: &dyn RecordStore, content: &str) -> StorageResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: VerificationRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping invalid record");
                summary.rejected += 1;
                continue;
            }
        };

        store.put_record(&record).await?;
        debug!(record_id = %record.id, "Record imported");
        summary.imported += 1;
    }

    Ok(summary)
}
