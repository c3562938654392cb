//! Error types for the HTTP API.
//!
//! Every failure leaves the server as a JSON body:
//!
//! ```json
//! { "code": "overbooked", "message": "The following products are overbooked: Tile A", "details": { ... } }
//! ```
//!
//! ## Status Mapping
//! ```text
//! DbError::NotFound / CoreError::NotFound        → 404 not_found
//! ValidationError, CSV import failures           → 400 validation_failed / import_failed
//! Overbooked, StockBelowReserved, *InUse, dupes  → 409
//! missing or bad token                           → 401 unauthorized
//! CoreError::Forbidden                           → 403 forbidden
//! anything else                                  → 500 internal (details logged only)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use stockbook_core::CoreError;
use stockbook_db::DbError;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
        details: Option<Value>,
    },

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
        details: Option<Value>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "bad_request",
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::NotFound(format!("{} not found: {}", entity, id))
    }

    fn conflict(code: &'static str, message: String) -> Self {
        ApiError::Conflict {
            code,
            message,
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } | ApiError::Conflict { code, .. } => code,
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match self {
            ApiError::BadRequest {
                message, details, ..
            }
            | ApiError::Conflict {
                message, details, ..
            } => (message, details),
            ApiError::Internal(message) => {
                // Storage details stay in the log.
                error!(%message, "Request failed");
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        (
            status,
            Json(ErrorBody {
                code,
                message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NotFound { .. } | CoreError::ProductNotFound(_) => {
                ApiError::NotFound(error.to_string())
            }
            CoreError::Overbooked { ref products } => ApiError::Conflict {
                code: "overbooked",
                details: Some(json!({ "products": products })),
                message: error.to_string(),
            },
            CoreError::StockBelowReserved { .. } => {
                ApiError::conflict("stock_below_reserved", error.to_string())
            }
            CoreError::CategoryInUse { .. }
            | CoreError::CustomerHasBookings { .. }
            | CoreError::ProductHasBookings { .. } => {
                ApiError::conflict("in_use", error.to_string())
            }
            CoreError::Forbidden { .. } => ApiError::Forbidden(error.to_string()),
            CoreError::Import { row, ref reason } => ApiError::BadRequest {
                code: "import_failed",
                details: Some(json!({ "row": row, "reason": reason })),
                message: error.to_string(),
            },
            CoreError::CsvHeader(_) => ApiError::BadRequest {
                code: "import_failed",
                message: error.to_string(),
                details: None,
            },
            CoreError::Validation(ref inner) => ApiError::BadRequest {
                code: "validation_failed",
                message: inner.to_string(),
                details: None,
            },
            CoreError::Export(_) => ApiError::Internal(error.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Rejected(core) => core.into(),
            DbError::NotFound { .. } => ApiError::NotFound(error.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict("duplicate", error.to_string()),
            DbError::ForeignKeyViolation { .. } => {
                ApiError::conflict("foreign_key", error.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
