use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use pricing::types::ServiceKind;

use crate::error::{ApiError, ApiResult};
use crate::models::Transaction;
use crate::websocket::send_ledger_notifications;
use crate::{AppState, middleware::AuthUser};

use super::{ensure_float, settle_after_upstream};

// Betting account verification request
#[derive(Deserialize)]
pub struct BettingVerifyRequest {
    /// Betting site identifier, e.g. "bet9ja"
    pub provider: String,
    pub customer_id: String,
}

// Betting account verification response
#[derive(Serialize)]
pub struct BettingVerifyResponse {
    pub success: bool,
    pub customer_name: String,
    pub message: String,
}

// Verify a betting account before funding it
pub async fn verify_customer(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(payload): Json<BettingVerifyRequest>,
) -> ApiResult<(StatusCode, Json<BettingVerifyResponse>)> {
    if payload.provider.is_empty() || payload.customer_id.is_empty() {
        return Err(ApiError::Validation(
            "provider and customer_id are required".to_string(),
        ));
    }

    let customer = state
        .upstream
        .verify_betting_customer(&payload.provider, &payload.customer_id)
        .await?;
    let response = BettingVerifyResponse {
        success: true,
        customer_name: customer.customer_name,
        message: "Account verified".to_string(),
    };
    Ok((StatusCode::OK, Json(response)))
}

// Betting funding request
#[derive(Deserialize)]
pub struct BettingFundRequest {
    pub provider: String,
    pub customer_id: String,
    /// Amount to land in the betting account; the service charge goes on top.
    pub amount: Decimal,
    pub reference: Option<String>,
}

// Betting funding response
#[derive(Serialize)]
pub struct BettingFundResponse {
    pub success: bool,
    pub transaction: Transaction,
    pub amount: Decimal,
    pub service_charge: Decimal,
    pub total: Decimal,
}

// Fund a betting account. The wallet is charged amount + service charge; the
// provider receives the amount.
pub async fn fund_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<BettingFundRequest>,
) -> ApiResult<(StatusCode, Json<BettingFundResponse>)> {
    if payload.provider.is_empty() || payload.customer_id.is_empty() {
        return Err(ApiError::Validation(
            "provider and customer_id are required".to_string(),
        ));
    }

    let quote = {
        let rates = state.rates.lock().unwrap();
        rates.betting_quote(payload.amount)?
    };
    ensure_float(&state, payload.amount).await?;

    let reference = payload
        .reference
        .clone()
        .unwrap_or_else(|| format!("bet-{}", Uuid::new_v4()));
    let receipt = state.storage.debit_for_purchase(
        user.user_id,
        &reference,
        ServiceKind::Betting,
        quote.total,
        json!({
            "provider": payload.provider,
            "customer_id": payload.customer_id,
            "amount": payload.amount,
            "service_charge": quote.service_charge,
        }),
        &format!("{} account funding", payload.provider),
    )?;
    if receipt.replayed {
        let response = BettingFundResponse {
            success: true,
            transaction: receipt.transaction,
            amount: payload.amount,
            service_charge: quote.service_charge,
            total: quote.total,
        };
        return Ok((StatusCode::OK, Json(response)));
    }
    send_ledger_notifications(&state.notification_manager, &receipt);

    let transaction_id = receipt.transaction.id;
    let result = state
        .upstream
        .fund_betting(
            &payload.provider,
            &payload.customer_id,
            payload.amount,
            &reference,
        )
        .await;
    let (transaction, _) =
        settle_after_upstream(&state, user.user_id, transaction_id, result).await?;

    let response = BettingFundResponse {
        success: true,
        transaction,
        amount: payload.amount,
        service_charge: quote.service_charge,
        total: quote.total,
    };
    Ok((StatusCode::CREATED, Json(response)))
}
