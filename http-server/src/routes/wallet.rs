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

// Wallet balance response
#[derive(Serialize)]
pub struct WalletResponse {
    pub success: bool,
    pub balance: Decimal,
}

// Get wallet balance endpoint
pub async fn get_wallet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<(StatusCode, Json<WalletResponse>)> {
    let user = state
        .storage
        .get_user(user.user_id)
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    let response = WalletResponse {
        success: true,
        balance: user.wallet,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Transaction history response
#[derive(Serialize)]
pub struct TransactionListResponse {
    pub success: bool,
    pub transactions: Vec<Transaction>,
}

// Transaction history endpoint, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<(StatusCode, Json<TransactionListResponse>)> {
    let transactions = state.storage.list_transactions(user.user_id);
    let response = TransactionListResponse {
        success: true,
        transactions,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Deposit request
#[derive(Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
    /// Payment gateway or bank transfer reference; generated when omitted.
    pub reference: Option<String>,
}

// Deposit response
#[derive(Serialize)]
pub struct DepositResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub balance: Decimal,
}

// Fund the wallet. Replaying the same reference returns the original credit.
pub async fn deposit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<DepositRequest>,
) -> ApiResult<(StatusCode, Json<DepositResponse>)> {
    if payload.amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "Deposit amount must be greater than 0".to_string(),
        ));
    }

    let reference = payload
        .reference
        .unwrap_or_else(|| format!("deposit-{}", Uuid::new_v4()));
    let receipt = state.storage.credit(
        user.user_id,
        &reference,
        ServiceKind::Deposit,
        payload.amount.round_dp(2),
        json!({ "channel": "bank_transfer" }),
        TransactionStatus::Success,
        "wallet funded",
    )?;

    if !receipt.replayed {
        send_ledger_notifications(&state.notification_manager, &receipt);
    }

    let status = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let response = DepositResponse {
        success: true,
        message: "Wallet funded".to_string(),
        transaction: receipt.transaction,
        balance: receipt.balance,
    };
    Ok((status, Json(response)))
}

// Withdrawal request
#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub account_number: String,
    pub bank_code: String,
    pub reference: Option<String>,
}

// Withdrawal response
#[derive(Serialize)]
pub struct WithdrawResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub balance: Decimal,
    pub account_name: String,
}

// Request a payout to a bank account. The debit is held as pending until an
// admin settles the transfer; a failed settlement refunds it.
pub async fn withdraw(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<WithdrawRequest>,
) -> ApiResult<(StatusCode, Json<WithdrawResponse>)> {
    if payload.amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "Withdrawal amount must be greater than 0".to_string(),
        ));
    }
    if payload.account_number.is_empty() || payload.bank_code.is_empty() {
        return Err(ApiError::Validation(
            "Account number and bank code are required".to_string(),
        ));
    }

    // Confirm the destination account before taking any money
    let account = state
        .upstream
        .resolve_account(&payload.account_number, &payload.bank_code)
        .await?;

    let reference = payload
        .reference
        .unwrap_or_else(|| format!("withdraw-{}", Uuid::new_v4()));
    let receipt = state.storage.debit_for_purchase(
        user.user_id,
        &reference,
        ServiceKind::Withdrawal,
        payload.amount.round_dp(2),
        json!({
            "account_number": account.account_number,
            "account_name": account.account_name,
            "bank_code": account.bank_code,
        }),
        "withdrawal requested",
    )?;

    if !receipt.replayed {
        send_ledger_notifications(&state.notification_manager, &receipt);
    }

    let status = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let response = WithdrawResponse {
        success: true,
        message: "Withdrawal queued for processing".to_string(),
        transaction: receipt.transaction,
        balance: receipt.balance,
        account_name: account.account_name,
    };
    Ok((status, Json(response)))
}

// Bank account resolution query
#[derive(Deserialize)]
pub struct ResolveAccountParams {
    pub account_number: String,
    pub bank_code: String,
}

// Bank account resolution response
#[derive(Serialize)]
pub struct ResolveAccountResponse {
    pub success: bool,
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
}

// Resolve an account number to the holder's name
pub async fn resolve_account(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<ResolveAccountParams>,
) -> ApiResult<(StatusCode, Json<ResolveAccountResponse>)> {
    if params.account_number.is_empty() || params.bank_code.is_empty() {
        return Err(ApiError::Validation(
            "Account number and bank code are required".to_string(),
        ));
    }

    let account = state
        .upstream
        .resolve_account(&params.account_number, &params.bank_code)
        .await?;
    let response = ResolveAccountResponse {
        success: true,
        account_number: account.account_number,
        account_name: account.account_name,
        bank_code: account.bank_code,
    };
    Ok((StatusCode::OK, Json(response)))
}
