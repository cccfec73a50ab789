use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::{RouteRequest, RouteResponse, SharedState};
use crate::error::{ErrorCode, HistoryError, HistoryResult};
use crate::transaction::TRANSACTION_ID_PARAM;

/// Resource served by the history views.
pub const HISTORY_RESOURCE: &str = "history";

/// Resource served by single-record lookups.
pub const TRANSACTION_RESOURCE: &str = "transaction";

/// Wire error body: `{"error": {"code", "message", "timestamp"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.as_str().to_string(),
                message: message.into(),
                timestamp: Utc::now(),
            },
        }
    }
}

/// Route a request to its resource and render the response.
///
/// Never fails: every error becomes an error envelope with its status.
pub async fn handle_route(state: &SharedState, request: RouteRequest) -> RouteResponse {
    let request_id = request.request_id();
    let resource = request.resource.as_deref().map(str::trim).unwrap_or("");

    info!(request_id = %request_id, resource = %resource, "Routing request");

    match resource {
        "" => error_response(
            request_id,
            ErrorCode::MissingType,
            "Missing required 'resource' field",
        ),
        HISTORY_RESOURCE => {
            let result = state
                .history
                .handle(&request_id, &request.query_parameters)
                .await;
            render(request_id, result, ErrorCode::OperationFailed)
        }
        TRANSACTION_RESOURCE => {
            let transaction_id = request
                .path_parameters
                .get(TRANSACTION_ID_PARAM)
                .map(String::as_str);
            let result = state
                .transactions
                .get_transaction(&request_id, transaction_id)
                .await;
            render(request_id, result, ErrorCode::DatabaseError)
        }
        other => error_response(
            request_id,
            ErrorCode::InvalidType,
            format!(
                "Invalid resource: {}. Valid values: {}, {}",
                other, HISTORY_RESOURCE, TRANSACTION_RESOURCE
            ),
        ),
    }
}

fn render<T: Serialize>(
    request_id: String,
    result: HistoryResult<T>,
    store_code: ErrorCode,
) -> RouteResponse {
    let body = match result {
        Ok(body) => body,
        Err(e) => {
            let (code, message) = map_error(&e, store_code);
            if code.status() >= 500 {
                error!(request_id = %request_id, error = %e, code = %code, "Request failed");
            } else {
                warn!(request_id = %request_id, error = %e, code = %code, "Request rejected");
            }
            return error_response(request_id, code, message);
        }
    };

    match serde_json::to_value(&body) {
        Ok(value) => {
            info!(request_id = %request_id, "Request completed");
            RouteResponse::new(request_id, 200, value)
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to serialize response");
            error_response(
                request_id,
                ErrorCode::SerializationError,
                "Failed to serialize response",
            )
        }
    }
}

/// Map an operation error to its wire code and client-facing message.
///
/// Internal failures carry a fixed message; their detail only goes to the log.
pub fn map_error(err: &HistoryError, store_code: ErrorCode) -> (ErrorCode, String) {
    match err {
        HistoryError::Validation { code, message } | HistoryError::NotFound { code, message } => {
            (*code, message.clone())
        }
        HistoryError::UnsupportedFormat { .. } => (ErrorCode::UnsupportedFormat, err.to_string()),
        HistoryError::Serialization(_) => (
            ErrorCode::SerializationError,
            "Failed to serialize response".to_string(),
        ),
        HistoryError::Store(_) if store_code == ErrorCode::DatabaseError => (
            ErrorCode::DatabaseError,
            "Failed to retrieve transaction from database".to_string(),
        ),
        HistoryError::Store(_) | HistoryError::Parse(_) | HistoryError::Artifact { .. } => (
            ErrorCode::OperationFailed,
            "Internal server error during history operation".to_string(),
        ),
    }
}

/// Build an error response with the status implied by the code.
pub fn error_response(
    request_id: String,
    code: ErrorCode,
    message: impl Into<String>,
) -> RouteResponse {
    let envelope = ErrorEnvelope::new(code, message);
    let body = serde_json::to_value(&envelope).unwrap_or(Value::Null);
    RouteResponse::new(request_id, code.status(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, StorageError};

    #[test]
    fn test_error_envelope_shape() {
        let response = error_response("req-1".to_string(), ErrorCode::InvalidView, "bad view");
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body["error"]["code"], "INVALID_VIEW");
        assert_eq!(response.body["error"]["message"], "bad view");
        assert!(response.body["error"]["timestamp"].is_string());
    }

    #[test]
    fn test_map_validation_and_not_found() {
        let err = HistoryError::validation(ErrorCode::MissingFormat, "format required");
        assert_eq!(
            map_error(&err, ErrorCode::OperationFailed),
            (ErrorCode::MissingFormat, "format required".to_string())
        );

        let err = HistoryError::NotFound {
            code: ErrorCode::TransactionNotFound,
            message: "gone".to_string(),
        };
        let (code, _) = map_error(&err, ErrorCode::DatabaseError);
        assert_eq!(code.status(), 404);
    }

    #[test]
    fn test_map_store_errors_by_resource() {
        let err = HistoryError::Store(StorageError::Query {
            message: "secret detail".to_string(),
        });

        let (code, message) = map_error(&err, ErrorCode::OperationFailed);
        assert_eq!(code, ErrorCode::OperationFailed);
        assert!(!message.contains("secret"));

        let (code, _) = map_error(&err, ErrorCode::DatabaseError);
        assert_eq!(code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_map_unsupported_format() {
        let err = HistoryError::UnsupportedFormat {
            format: "pdf".to_string(),
        };
        let (code, message) = map_error(&err, ErrorCode::OperationFailed);
        assert_eq!(code, ErrorCode::UnsupportedFormat);
        assert_eq!(code.status(), 400);
        assert!(message.contains("pdf"));
    }

    #[test]
    fn test_map_internal_errors() {
        let parse = HistoryError::Parse(ParseError::EmptyContent);
        assert_eq!(map_error(&parse, ErrorCode::OperationFailed).0, ErrorCode::OperationFailed);

        let artifact = HistoryError::Artifact {
            message: "disk full".to_string(),
        };
        assert_eq!(
            map_error(&artifact, ErrorCode::OperationFailed).0,
            ErrorCode::OperationFailed
        );

        let json_err = serde_json::from_str::<Value>("{").unwrap_err();
        let serialization = HistoryError::Serialization(json_err);
        assert_eq!(
            map_error(&serialization, ErrorCode::OperationFailed).0,
            ErrorCode::SerializationError
        );
    }
}
