//! Single-record retrieval by transaction id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::error::{ErrorCode, HistoryError, HistoryResult};
use crate::history::classifier::{classify, classify_scores};
use crate::history::parser::parse_outcome;
use crate::history::types::{
    parse_record_timestamp, Classification, MatchResult, PARSE_FAILURE_EXPLANATION,
    UNKNOWN_VERDICT,
};
use crate::storage::{AiResponse, RecordStore, TokenUsage, VerificationRecord};

/// Version reported in transaction metadata.
pub const API_VERSION: &str = "v1";

/// Path parameter carrying the transaction id.
pub const TRANSACTION_ID_PARAM: &str = "transactionId";

/// Full view of one verification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub product_id: String,
    pub product_category: String,
    pub uploaded_label_image_key: String,
    pub uploaded_overview_image_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_reference_image_key: Option<String>,
    pub verification_result: Classification,
    pub overall_confidence: f64,
    pub label_verification: MatchResult,
    pub overview_verification: MatchResult,
    pub ai_analysis: AiAnalysis,
    pub raw_response: AiResponse,
    pub metadata: TransactionMetadata,
}

/// Model call details and estimated cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub model: String,
    pub model_id: String,
    pub stop_reason: String,
    pub token_usage: TokenUsage,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    pub retrieved_at: DateTime<Utc>,
    pub api_version: String,
}

/// Looks up individual records.
#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn RecordStore>,
    pricing: PricingConfig,
}

impl TransactionService {
    pub fn new(store: Arc<dyn RecordStore>, pricing: PricingConfig) -> Self {
        Self { store, pricing }
    }

    /// Fetch one record and build its detail view.
    ///
    /// The id must be present and a valid UUID. A payload that fails to
    /// parse still yields a detail with placeholder verification fields.
    pub async fn get_transaction(
        &self,
        request_id: &str,
        transaction_id: Option<&str>,
    ) -> HistoryResult<TransactionDetail> {
        let transaction_id = transaction_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                HistoryError::validation(
                    ErrorCode::MissingTransactionId,
                    "Transaction ID is required in path",
                )
            })?;

        if Uuid::parse_str(transaction_id).is_err() {
            return Err(HistoryError::validation(
                ErrorCode::InvalidTransactionId,
                "Transaction ID must be a valid UUID",
            ));
        }

        debug!(request_id = %request_id, transaction_id = %transaction_id, "Fetching transaction");

        let record = self
            .store
            .get_record(transaction_id)
            .await?
            .ok_or_else(|| HistoryError::NotFound {
                code: ErrorCode::TransactionNotFound,
                message: format!("Transaction with ID '{}' was not found", transaction_id),
            })?;

        let detail = self.build_detail(request_id, record, Utc::now());
        info!(
            request_id = %request_id,
            transaction_id = %detail.id,
            result = %detail.verification_result,
            "Transaction retrieved"
        );
        Ok(detail)
    }

    fn build_detail(
        &self,
        request_id: &str,
        record: VerificationRecord,
        now: DateTime<Utc>,
    ) -> TransactionDetail {
        let (verification_result, overall_confidence, label, overview) =
            match parse_outcome(&record.ai_response) {
                Ok(outcome) => (
                    classify(&outcome),
                    outcome.overall_confidence(),
                    MatchResult {
                        result: outcome.label_result().to_string(),
                        confidence: outcome.label_score(),
                        explanation: outcome.label_explanation.clone().unwrap_or_default(),
                    },
                    MatchResult {
                        result: outcome.overview_result().to_string(),
                        confidence: outcome.overview_score(),
                        explanation: outcome.overview_explanation.clone().unwrap_or_default(),
                    },
                ),
                Err(e) => {
                    warn!(
                        request_id = %request_id,
                        record_id = %record.id,
                        error = %e,
                        "Failed to parse AI response, using placeholder values"
                    );
                    let unparsed = MatchResult {
                        result: UNKNOWN_VERDICT.to_string(),
                        confidence: 0.0,
                        explanation: PARSE_FAILURE_EXPLANATION.to_string(),
                    };
                    (classify_scores(false, false, 0.0), 0.0, unparsed.clone(), unparsed)
                }
            };

        let timestamp = parse_record_timestamp(&record.timestamp).unwrap_or_else(|| {
            warn!(
                request_id = %request_id,
                timestamp = %record.timestamp,
                "Failed to parse record timestamp, using current time"
            );
            now
        });

        let usage = record.ai_response.usage;
        let ai_analysis = AiAnalysis {
            model: record.ai_response.model.clone(),
            model_id: record.ai_response.id.clone(),
            stop_reason: record.ai_response.stop_reason.clone().unwrap_or_default(),
            token_usage: usage,
            estimated_cost: self.pricing.estimate(usage.input_tokens, usage.output_tokens),
        };

        TransactionDetail {
            id: record.id,
            timestamp,
            product_id: record.product_id,
            product_category: record.product_category,
            uploaded_label_image_key: record.uploaded_label_image_key,
            uploaded_overview_image_key: record.uploaded_overview_image_key,
            uploaded_reference_image_key: record.uploaded_reference_image_key,
            verification_result,
            overall_confidence,
            label_verification: label,
            overview_verification: overview,
            ai_analysis,
            raw_response: record.ai_response,
            metadata: TransactionMetadata {
                retrieved_at: now,
                api_version: API_VERSION.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MockRecordStore;
    use serde_json::json;

    const ID: &str = "6f1c2a9e-3b7d-4c1e-9a55-0d2f4b8e7c11";

    fn record() -> VerificationRecord {
        let payload = json!({
            "matchLabelToReference": "yes",
            "matchLabelToReference_confidence": 0.95,
            "label_explanation": "Same label",
            "matchOverviewToReference": "yes",
            "matchOverviewToReference_confidence": 0.9,
            "overview_explanation": "Same product",
        });
        let mut response = AiResponse::new("claude-3-sonnet")
            .with_usage(2000, 400)
            .with_stop_reason("end_turn");
        response.id = "msg_01".to_string();
        let response = match payload {
            serde_json::Value::Object(map) => response.with_mapped(map),
            _ => unreachable!(),
        };
        VerificationRecord::new(ID, "2024-05-01T10:00:00Z", "P-1", "REF", response)
            .with_images("label.jpg", "overview.jpg")
            .with_reference_image("reference.jpg")
    }

    fn service_with(store: MockRecordStore) -> TransactionService {
        TransactionService::new(Arc::new(store), PricingConfig::default())
    }

    #[tokio::test]
    async fn test_missing_id() {
        let mut store = MockRecordStore::new();
        store.expect_get_record().never();
        let service = service_with(store);

        for id in [None, Some(""), Some("   ")] {
            let err = service.get_transaction("req", id).await.unwrap_err();
            assert!(matches!(
                err,
                HistoryError::Validation {
                    code: ErrorCode::MissingTransactionId,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let mut store = MockRecordStore::new();
        store.expect_get_record().never();
        let err = service_with(store)
            .get_transaction("req", Some("not-a-uuid"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HistoryError::Validation {
                code: ErrorCode::InvalidTransactionId,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_not_found() {
        let mut store = MockRecordStore::new();
        store
            .expect_get_record()
            .withf(|id| id == ID)
            .returning(|_| Ok(None));
        let err = service_with(store)
            .get_transaction("req", Some(ID))
            .await
            .unwrap_err();
        match err {
            HistoryError::NotFound { code, message } => {
                assert_eq!(code, ErrorCode::TransactionNotFound);
                assert!(message.contains(ID));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure() {
        let mut store = MockRecordStore::new();
        store.expect_get_record().returning(|_| {
            Err(StorageError::Connection {
                message: "pool closed".to_string(),
            })
        });
        let err = service_with(store)
            .get_transaction("req", Some(ID))
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Store(_)));
    }

    #[tokio::test]
    async fn test_detail() {
        let mut store = MockRecordStore::new();
        store
            .expect_get_record()
            .returning(|_| Ok(Some(record())));
        let detail = service_with(store)
            .get_transaction("req", Some(ID))
            .await
            .unwrap();

        assert_eq!(detail.id, ID);
        assert_eq!(detail.verification_result, Classification::Correct);
        assert!((detail.overall_confidence - 0.925).abs() < 1e-9);
        assert_eq!(detail.label_verification.explanation, "Same label");
        assert_eq!(detail.uploaded_reference_image_key.as_deref(), Some("reference.jpg"));
        assert_eq!(detail.ai_analysis.model_id, "msg_01");
        assert_eq!(detail.ai_analysis.stop_reason, "end_turn");
        assert!((detail.ai_analysis.estimated_cost - (2000.0 * 0.000003 + 400.0 * 0.000015)).abs() < 1e-12);
        assert_eq!(detail.metadata.api_version, "v1");

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["aiAnalysis"]["tokenUsage"]["input_tokens"], 2000);
        assert_eq!(value["rawResponse"]["model"], "claude-3-sonnet");
        assert_eq!(value["labelVerification"]["result"], "yes");
    }

    #[tokio::test]
    async fn test_unparsable_payload_uses_placeholders() {
        let mut broken = record();
        broken.ai_response.content.clear();
        let mut store = MockRecordStore::new();
        store
            .expect_get_record()
            .returning(move |_| Ok(Some(broken.clone())));

        let detail = service_with(store)
            .get_transaction("req", Some(ID))
            .await
            .unwrap();

        assert_eq!(detail.verification_result, Classification::Incorrect);
        assert_eq!(detail.overall_confidence, 0.0);
        assert_eq!(detail.label_verification.result, "unknown");
        assert_eq!(detail.overview_verification.explanation, "Failed to parse AI response");
    }
}
