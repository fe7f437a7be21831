//! Operations desk: gift card review queue, manual settlement of pending
//! transactions and user verification flags.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pricing::types::TransactionStatus;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthenticatedUser, GiftCardSubmission, KycStatus, SettleOutcome, SubmissionStatus, Transaction,
};
use crate::websocket::{send_giftcard_notification, send_ledger_notifications};
use crate::{AppState, middleware::AdminUser};

// Review queue query
#[derive(Deserialize)]
pub struct SubmissionQueueParams {
    pub status: Option<SubmissionStatus>,
}

// Review queue response
#[derive(Serialize)]
pub struct SubmissionQueueResponse {
    pub success: bool,
    pub submissions: Vec<GiftCardSubmission>,
}

// All gift card submissions, optionally filtered by status
pub async fn list_submissions(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<SubmissionQueueParams>,
) -> ApiResult<(StatusCode, Json<SubmissionQueueResponse>)> {
    let submissions = state.storage.submissions_with_status(params.status);
    let response = SubmissionQueueResponse {
        success: true,
        submissions,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Counter-offer request
#[derive(Deserialize)]
pub struct NegotiateRequest {
    pub proposed_rate: Decimal,
    pub note: Option<String>,
}

// Submission action response
#[derive(Serialize)]
pub struct SubmissionActionResponse {
    pub success: bool,
    pub message: String,
    pub submission: GiftCardSubmission,
}

// Counter-offer a submission at a different rate
pub async fn negotiate_submission(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<NegotiateRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionActionResponse>)> {
    if payload.proposed_rate <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "proposed_rate must be greater than 0".to_string(),
        ));
    }

    let submission =
        state
            .storage
            .propose_rate(submission_id, payload.proposed_rate, payload.note)?;
    send_giftcard_notification(&state.notification_manager, &submission);

    let response = SubmissionActionResponse {
        success: true,
        message: "Counter-offer sent".to_string(),
        submission,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Approval response carries the payout transaction
#[derive(Serialize)]
pub struct ApproveResponse {
    pub success: bool,
    pub message: String,
    pub submission: GiftCardSubmission,
    pub transaction: Transaction,
}

// Approve a submission and pay the wallet
pub async fn approve_submission(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(submission_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ApproveResponse>)> {
    let (submission, receipt) = state.storage.approve_submission(submission_id)?;
    send_ledger_notifications(&state.notification_manager, &receipt);
    send_giftcard_notification(&state.notification_manager, &submission);

    tracing::info!(
        "gift card submission {} approved, paid {}",
        submission_id,
        receipt.transaction.amount
    );
    let response = ApproveResponse {
        success: true,
        message: "Submission approved and paid".to_string(),
        submission,
        transaction: receipt.transaction,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Rejection request
#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

// Reject a submission with a reason the user will see
pub async fn reject_submission(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionActionResponse>)> {
    if payload.reason.trim().is_empty() {
        return Err(ApiError::Validation(
            "A reason is required to reject a submission".to_string(),
        ));
    }

    let submission = state
        .storage
        .reject_submission(submission_id, payload.reason)?;
    send_giftcard_notification(&state.notification_manager, &submission);

    let response = SubmissionActionResponse {
        success: true,
        message: "Submission rejected".to_string(),
        submission,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Manual settlement request
#[derive(Deserialize)]
pub struct SettleRequest {
    pub user_id: u64,
    pub transaction_id: Uuid,
    /// "success" or "failed"
    pub status: TransactionStatus,
    pub message: Option<String>,
    pub upstream_order_id: Option<String>,
}

// Manual settlement response
#[derive(Serialize)]
pub struct SettleResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub balance: Decimal,
}

// Settle a pending transaction: failed debits refund, successful credits pay
pub async fn settle_transaction(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(payload): Json<SettleRequest>,
) -> ApiResult<(StatusCode, Json<SettleResponse>)> {
    let receipt = state.storage.settle_transaction(
        payload.user_id,
        payload.transaction_id,
        SettleOutcome {
            status: payload.status,
            message: payload
                .message
                .unwrap_or_else(|| "settled by operations".to_string()),
            upstream_order_id: payload.upstream_order_id,
        },
    )?;
    send_ledger_notifications(&state.notification_manager, &receipt);

    tracing::info!(
        "transaction {} settled as {:?}",
        payload.transaction_id,
        payload.status
    );
    let response = SettleResponse {
        success: true,
        message: "Transaction settled".to_string(),
        transaction: receipt.transaction,
        balance: receipt.balance,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Verification update request
#[derive(Deserialize)]
pub struct VerificationRequest {
    pub email_verified: Option<bool>,
    pub kyc_status: Option<KycStatus>,
}

// Verification update response
#[derive(Serialize)]
pub struct VerificationResponse {
    pub success: bool,
    pub message: String,
    pub user: AuthenticatedUser,
}

// Update a user's verification flags
pub async fn update_verification(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<u64>,
    Json(payload): Json<VerificationRequest>,
) -> ApiResult<(StatusCode, Json<VerificationResponse>)> {
    if payload.email_verified.is_none() && payload.kyc_status.is_none() {
        return Err(ApiError::Validation(
            "Nothing to update: set email_verified or kyc_status".to_string(),
        ));
    }

    let user = state
        .storage
        .update_verification(user_id, payload.email_verified, payload.kyc_status)?;
    let response = VerificationResponse {
        success: true,
        message: "Verification updated".to_string(),
        user: AuthenticatedUser::from(user),
    };
    Ok((StatusCode::OK, Json(response)))
}
