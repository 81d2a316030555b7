use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Unified error type for every fallible operation in the crate.
///
/// Handlers return `AppError` directly and the `IntoResponse` impl maps each
/// variant onto an HTTP status plus a JSON body of the shape
/// `{"error": "...", "field": "..."}` (the `field` key is only present for
/// validation failures, so clients can attach the message to a form input).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Rejected input. `field` names the offending request field.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The named entity does not exist (or belongs to another user).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A timer is already running for this user.
    #[error("another session is already being timed")]
    TimerBusy,

    /// Invoice deletion is restricted to drafts.
    #[error("only draft invoices can be deleted")]
    InvoiceNotDraft,

    /// Cancelled invoices are terminal and never re-enter the status cycle.
    #[error("cancelled invoices cannot change status")]
    InvoiceCancelled,

    /// A lead referenced a stage key that its funnel does not define.
    #[error("stage '{0}' does not belong to this funnel")]
    UnknownStage(String),

    /// The exchange-rate provider failed or returned an unusable table.
    #[error("exchange-rate lookup failed: {0}")]
    UpstreamService(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Convenience constructor for field-scoped validation failures.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::UnknownStage(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TimerBusy | AppError::InvoiceNotDraft | AppError::InvoiceCancelled => {
                StatusCode::CONFLICT
            }
            AppError::UpstreamService(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server-side faults get logged with their source; client faults only
        // travel back in the response body.
        let body = match &self {
            AppError::Validation { field, message } => {
                json!({ "error": message, "field": field })
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                json!({ "error": "database error" })
            }
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                json!({ "error": "internal error" })
            }
            AppError::UpstreamService(detail) => {
                tracing::warn!("Upstream rate provider failure: {}", detail);
                json!({ "error": self.to_string() })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
