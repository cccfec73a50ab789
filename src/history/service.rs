//! Request orchestration for the list, summary and export views.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::analytics::summarize;
use super::artifact::ArtifactStore;
use super::classifier::classify;
use super::export::{artifact_filename, format_file_size, render, ExportFormat};
use super::filter::{
    applied_filters, build_filter, build_range_filter, format_timestamp, param,
    resolve_date_range,
};
use super::paginator::{paginate, sort_newest_first, PageRequest};
use super::parser::parse_outcome;
use super::types::{
    ExportData, HistoryData, HistoryItem, HistoryResponse, QueryParams, ResponseMetadata, View,
};
use crate::config::Config;
use crate::error::{ErrorCode, HistoryError, HistoryResult};
use crate::storage::{RecordStore, VerificationRecord};

/// Query parameter selecting the view.
pub const VIEW_PARAM: &str = "view";

/// Query parameter selecting the export format.
pub const FORMAT_PARAM: &str = "format";

/// Serves history requests against a record store.
///
/// Holds no per-request state; one instance is shared by all requests.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactStore>,
    config: Arc<Config>,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        artifacts: Arc<dyn ArtifactStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            artifacts,
            config,
        }
    }

    /// Route a request to its view. A missing `view` means `list`.
    pub async fn handle(
        &self,
        request_id: &str,
        params: &QueryParams,
    ) -> HistoryResult<HistoryResponse> {
        let view = match param(params, VIEW_PARAM) {
            None => View::List,
            Some(raw) => raw
                .parse::<View>()
                .map_err(|message| HistoryError::validation(ErrorCode::InvalidView, message))?,
        };

        info!(request_id = %request_id, view = %view, "Processing history request");

        match view {
            View::List => self.list(request_id, params).await,
            View::Summary => self.summary(request_id, params).await,
            View::Export => self.export(request_id, params).await,
        }
    }

    /// Filtered, newest-first page of history items.
    ///
    /// Records whose payload fails to parse stay in the page as placeholders.
    pub async fn list(
        &self,
        request_id: &str,
        params: &QueryParams,
    ) -> HistoryResult<HistoryResponse> {
        let request = PageRequest::from_params(params);
        let filter = build_filter(params);
        debug!(
            request_id = %request_id,
            page = request.page,
            page_size = request.page_size,
            filter = %filter.expression(),
            "Listing history"
        );

        let mut records = self.store.scan(&filter).await?;
        sort_newest_first(&mut records);

        let page = paginate(records, request);
        let items: Vec<HistoryItem> = page
            .items
            .iter()
            .map(|record| to_history_item(request_id, record))
            .collect();

        info!(
            request_id = %request_id,
            returned = items.len(),
            total = page.pagination.total_records,
            "History list completed"
        );

        Ok(HistoryResponse {
            view: View::List,
            data: HistoryData::List(items),
            pagination: Some(page.pagination),
            metadata: ResponseMetadata {
                scanned_at: Some(Utc::now()),
                applied_filters: Some(applied_filters(params)),
                ..Default::default()
            },
        })
    }

    /// Aggregate statistics over the requested date range.
    pub async fn summary(
        &self,
        request_id: &str,
        params: &QueryParams,
    ) -> HistoryResult<HistoryResponse> {
        self.summary_at(request_id, params, Utc::now()).await
    }

    /// [`summary`](Self::summary) with an explicit clock.
    pub async fn summary_at(
        &self,
        request_id: &str,
        params: &QueryParams,
        now: DateTime<Utc>,
    ) -> HistoryResult<HistoryResponse> {
        let range = resolve_date_range(params, now);
        debug!(
            request_id = %request_id,
            from = %format_timestamp(range.from),
            to = %format_timestamp(range.to),
            "Summarizing history"
        );

        let records = self.store.scan(&build_range_filter(&range)).await?;
        let summary = summarize(&records, &self.config.pricing);

        info!(
            request_id = %request_id,
            scanned = records.len(),
            total = summary.total_verifications,
            success_rate = summary.success_rate,
            "Summary completed"
        );

        Ok(HistoryResponse {
            view: View::Summary,
            data: HistoryData::Summary(Box::new(summary)),
            pagination: None,
            metadata: ResponseMetadata {
                scanned_at: Some(now),
                date_range: Some(range),
                ..Default::default()
            },
        })
    }

    /// Write the filtered records to an artifact and describe it.
    pub async fn export(
        &self,
        request_id: &str,
        params: &QueryParams,
    ) -> HistoryResult<HistoryResponse> {
        self.export_at(request_id, params, Utc::now()).await
    }

    /// [`export`](Self::export) with an explicit clock.
    pub async fn export_at(
        &self,
        request_id: &str,
        params: &QueryParams,
        now: DateTime<Utc>,
    ) -> HistoryResult<HistoryResponse> {
        let raw_format = param(params, FORMAT_PARAM).ok_or_else(|| {
            HistoryError::validation(
                ErrorCode::MissingFormat,
                "Missing required 'format' parameter",
            )
        })?;
        let format = ExportFormat::parse(raw_format)?;

        let filter = build_filter(params);
        debug!(
            request_id = %request_id,
            format = %format,
            filter = %filter.expression(),
            "Exporting history"
        );

        let mut records = self.store.scan(&filter).await?;
        sort_newest_first(&mut records);
        let limit = self.config.export.max_records;
        if records.len() > limit {
            warn!(
                request_id = %request_id,
                matched = records.len(),
                limit,
                "Export truncated to the configured maximum"
            );
            records.truncate(limit);
        }

        let expires_at = link_expiry(now, self.config.export.link_ttl_hours)?;
        let rendered = render(&records, format, now)?;
        let filename = artifact_filename(format, now);
        let location = self
            .artifacts
            .put(&filename, rendered.content.as_bytes())
            .await?;

        let data = ExportData {
            download_url: location.download_url,
            expires_at,
            format: format.to_string(),
            record_count: rendered.record_count,
            file_size: format_file_size(location.size),
        };

        info!(
            request_id = %request_id,
            file = %location.filename,
            records = data.record_count,
            size = %data.file_size,
            "Export completed"
        );

        Ok(HistoryResponse {
            view: View::Export,
            data: HistoryData::Export(data),
            pagination: None,
            metadata: ResponseMetadata {
                exported_at: Some(now),
                applied_filters: Some(applied_filters(params)),
                ..Default::default()
            },
        })
    }
}

fn to_history_item(request_id: &str, record: &VerificationRecord) -> HistoryItem {
    match parse_outcome(&record.ai_response) {
        Ok(outcome) => HistoryItem::from_outcome(record, &outcome, classify(&outcome)),
        Err(e) => {
            warn!(
                request_id = %request_id,
                record_id = %record.id,
                error = %e,
                "Failed to parse AI response, returning placeholder"
            );
            HistoryItem::placeholder(record)
        }
    }
}

/// Expiry of a download link created at `now`.
fn link_expiry(now: DateTime<Utc>, ttl_hours: i64) -> HistoryResult<DateTime<Utc>> {
    Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| HistoryError::Artifact {
            message: format!("link lifetime of {} hours is out of range", ttl_hours),
        })
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
