use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::auth::SessionError;
use crate::services::{EntryError, GatewayError, IssuanceError, StorageError};
use crate::store::LedgerError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Authentication error: {0}")]
    AuthError(#[from] SessionError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Issuance failed: {0}")]
    Issuance(IssuanceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<IssuanceError> for AppError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::NotFound { entity, id } => {
                AppError::NotFound(format!("{entity} '{id}' was not found"))
            }
            failed @ IssuanceError::Failed { .. } => AppError::Issuance(failed),
        }
    }
}

impl From<EntryError> for AppError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::NotFound(_) => {
                AppError::NotFound("Invalid Ticket ID. Booking not found.".to_string())
            }
            EntryError::Ledger(err) => AppError::Ledger(err),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Issuance(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Storage(StorageError::NotFound { .. }) => "NOT_FOUND",
            AppError::Ledger(_) => "DATABASE_ERROR",
            AppError::Issuance(_) => "ISSUANCE_FAILED",
            AppError::Storage(_) | AppError::Gateway(_) => "EXTERNAL_SERVICE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg) | AppError::Forbidden(msg) | AppError::NotFound(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::InvalidSignature | AppError::AuthError(_) => {
                error!(error = %self, "Rejected request");
            }
            AppError::Ledger(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::Issuance(e) => {
                error!(error = ?e, "Issuance error");
            }
            AppError::Storage(e) => {
                error!(error = ?e, "Storage error");
            }
            AppError::Gateway(e) => {
                error!(error = ?e, "Payment gateway error");
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg) | AppError::Forbidden(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            AppError::InvalidSignature => "Invalid payment signature".to_string(),
            AppError::AuthError(_) => "Unauthorized".to_string(),
            AppError::Ledger(_) => "A database error occurred".to_string(),
            AppError::Issuance(_) => "Booking could not be completed".to_string(),
            AppError::Storage(StorageError::NotFound { .. }) => "Document not found".to_string(),
            AppError::Storage(_) => "Document storage is unavailable".to_string(),
            AppError::Gateway(_) => "Payment gateway is unavailable".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Do not expose internal details in the API response
        error_response(code, self.public_message(), None, status)
    }
}
