use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pricing::rates::GiftCardRate;

use crate::error::{ApiError, ApiResult};
use crate::models::{GiftCardSubmission, SubmissionStatus, get_current_timestamp};
use crate::websocket::send_giftcard_notification;
use crate::{AppState, middleware::AuthUser};

// Gift card rate board response
#[derive(Serialize)]
pub struct GiftCardRatesResponse {
    pub success: bool,
    pub rates: Vec<GiftCardRate>,
}

// Public rate board: brands, tiers and payouts per unit
pub async fn get_rates(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<GiftCardRatesResponse>)> {
    let rates = {
        let settings = state.rates.lock().unwrap();
        settings.gift_cards.clone()
    };
    let response = GiftCardRatesResponse {
        success: true,
        rates,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Gift card submission request
#[derive(Deserialize)]
pub struct SubmissionRequest {
    pub brand: String,
    pub face_value: Decimal,
    /// Proof images: card front, receipt and so on.
    pub image_urls: Vec<String>,
}

// Gift card submission response
#[derive(Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    pub submission: GiftCardSubmission,
}

// Submit a card for review at the current tier rate
pub async fn submit_card(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SubmissionRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionResponse>)> {
    if payload.image_urls.is_empty() || payload.image_urls.iter().any(|url| url.is_empty()) {
        return Err(ApiError::Validation(
            "At least one proof image is required".to_string(),
        ));
    }

    let (currency, quote) = {
        let settings = state.rates.lock().unwrap();
        let card = settings.gift_card(&payload.brand)?;
        (card.currency.clone(), card.payout(payload.face_value)?)
    };

    let now = get_current_timestamp();
    let submission = GiftCardSubmission {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        brand: payload.brand,
        currency,
        face_value: payload.face_value,
        image_urls: payload.image_urls,
        rate: quote.rate,
        expected_payout: quote.payout,
        proposed_rate: None,
        proposed_payout: None,
        admin_note: None,
        decline_reason: None,
        reject_reason: None,
        status: SubmissionStatus::Pending,
        payout_transaction_id: None,
        created_at: now,
        updated_at: now,
    };
    state.storage.insert_submission(submission.clone());
    send_giftcard_notification(&state.notification_manager, &submission);

    let response = SubmissionResponse {
        success: true,
        message: "Card submitted for review".to_string(),
        submission,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// Submission list response
#[derive(Serialize)]
pub struct SubmissionListResponse {
    pub success: bool,
    pub submissions: Vec<GiftCardSubmission>,
}

// The caller's own submissions, newest first
pub async fn list_submissions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<(StatusCode, Json<SubmissionListResponse>)> {
    let submissions = state.storage.submissions_for_user(user.user_id);
    let response = SubmissionListResponse {
        success: true,
        submissions,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Accept the admin's counter-offer
pub async fn accept_offer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(submission_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<SubmissionResponse>)> {
    let submission = state.storage.accept_offer(submission_id, user.user_id)?;
    send_giftcard_notification(&state.notification_manager, &submission);

    let response = SubmissionResponse {
        success: true,
        message: "Offer accepted; awaiting final approval".to_string(),
        submission,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Decline request
#[derive(Deserialize)]
pub struct DeclineRequest {
    pub reason: String,
}

// Decline the admin's counter-offer
pub async fn decline_offer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<DeclineRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionResponse>)> {
    if payload.reason.trim().is_empty() {
        return Err(ApiError::Validation(
            "A reason is required to decline an offer".to_string(),
        ));
    }

    let submission = state
        .storage
        .decline_offer(submission_id, user.user_id, payload.reason)?;
    send_giftcard_notification(&state.notification_manager, &submission);

    let response = SubmissionResponse {
        success: true,
        message: "Offer declined".to_string(),
        submission,
    };
    Ok((StatusCode::OK, Json(response)))
}
