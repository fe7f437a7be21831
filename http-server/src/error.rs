//! API error type shared by every route handler.
//!
//! Handlers return `Result<impl IntoResponse, ApiError>` and let `?` do the
//! plumbing. The response body always has the same shape as our success
//! envelopes: `{ "success": false, "message": "..." }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde_json::json;

use crate::models::LedgerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request payload or parameters.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid session token.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    /// Wallet cannot cover the charge. Clients show a fund-wallet prompt.
    #[error("insufficient wallet balance: need \u{20a6}{required}, have \u{20a6}{available}. Fund your wallet and try again")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("{0}")]
    NotFound(String),

    /// Duplicate reference or an illegal state transition.
    #[error("{0}")]
    Conflict(String),

    /// The provider call failed; any debit has already been refunded.
    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UserNotFound => ApiError::NotFound("user not found".to_string()),
            LedgerError::InsufficientBalance {
                required,
                available,
            } => ApiError::InsufficientBalance {
                required,
                available,
            },
            LedgerError::ReferenceConflict(_)
            | LedgerError::AlreadySettled(_)
            | LedgerError::InvalidTransition(_) => ApiError::Conflict(err.to_string()),
            LedgerError::TransactionNotFound | LedgerError::SubmissionNotFound => {
                ApiError::NotFound(err.to_string())
            }
            LedgerError::NotOwner => ApiError::Forbidden(err.to_string()),
            LedgerError::NonTerminalSettle => ApiError::Validation(err.to_string()),
        }
    }
}

impl From<pricing::rates::RateError> for ApiError {
    fn from(err: pricing::rates::RateError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Upstream(err.to_string())
    }
}
