//! Airtime-to-cash: users transfer airtime to our numbers and get a wallet
//! credit at the posted network rate once an admin confirms it arrived.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use pricing::types::{ServiceKind, TransactionStatus};

use crate::error::{ApiError, ApiResult};
use crate::models::Transaction;
use crate::websocket::send_ledger_notifications;
use crate::{AppState, middleware::AuthUser};

// Cash quote query
#[derive(Deserialize)]
pub struct CashQuoteParams {
    pub network: String,
    pub amount: Decimal,
}

// Cash quote response
#[derive(Serialize)]
pub struct CashQuoteResponse {
    pub success: bool,
    pub network: String,
    pub amount: Decimal,
    /// Conversion rate in [0, 1] for this network.
    pub rate: Decimal,
    pub amount_received: Decimal,
    pub service_fee: Decimal,
}

// Quote an airtime-to-cash conversion
pub async fn get_quote(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<CashQuoteParams>,
) -> ApiResult<(StatusCode, Json<CashQuoteResponse>)> {
    let (rate, quote) = {
        let rates = state.rates.lock().unwrap();
        let rate = rates.airtime_cash.rate(&params.network)?;
        let quote = rates.cash_quote(&params.network, params.amount)?;
        (rate, quote)
    };
    let response = CashQuoteResponse {
        success: true,
        network: params.network,
        amount: params.amount,
        rate,
        amount_received: quote.amount_received,
        service_fee: quote.service_fee,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Cash conversion submission request
#[derive(Deserialize)]
pub struct CashSubmissionRequest {
    pub network: String,
    /// Airtime amount the user is sending.
    pub amount: Decimal,
    /// Line the airtime is coming from.
    pub sender_phone: String,
    pub reference: Option<String>,
}

// Cash conversion submission response
#[derive(Serialize)]
pub struct CashSubmissionResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub amount_received: Decimal,
    pub service_fee: Decimal,
}

// Submit an airtime-to-cash conversion. Credits the wallet as pending; an
// admin settles it after confirming the airtime arrived.
pub async fn submit_conversion(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CashSubmissionRequest>,
) -> ApiResult<(StatusCode, Json<CashSubmissionResponse>)> {
    if payload.sender_phone.is_empty() {
        return Err(ApiError::Validation("sender_phone is required".to_string()));
    }

    let quote = {
        let rates = state.rates.lock().unwrap();
        rates.cash_quote(&payload.network, payload.amount)?
    };

    let reference = payload
        .reference
        .clone()
        .unwrap_or_else(|| format!("cash-{}", Uuid::new_v4()));
    let receipt = state.storage.credit(
        user.user_id,
        &reference,
        ServiceKind::AirtimeCash,
        quote.amount_received,
        json!({
            "network": payload.network,
            "airtime_amount": payload.amount,
            "sender_phone": payload.sender_phone,
            "service_fee": quote.service_fee,
        }),
        TransactionStatus::Pending,
        "awaiting airtime confirmation",
    )?;

    if !receipt.replayed {
        send_ledger_notifications(&state.notification_manager, &receipt);
    }

    let status = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let response = CashSubmissionResponse {
        success: true,
        message: "Conversion recorded; the credit lands once the airtime is confirmed".to_string(),
        transaction: receipt.transaction,
        amount_received: quote.amount_received,
        service_fee: quote.service_fee,
    };
    Ok((status, Json(response)))
}
