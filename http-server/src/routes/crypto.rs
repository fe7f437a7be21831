//! Crypto buy/sell desk.
//!
//! Prices come from the live USD spot feed with our margin and the USD/NGN
//! rate applied. Buys debit the wallet and stay pending until an admin
//! confirms the coins were sent; sells record a pending credit that pays out
//! once the coins arrive.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use pricing::types::{CryptoQuote, ServiceKind, TradeSide, TransactionStatus};

use crate::error::{ApiError, ApiResult};
use crate::models::Transaction;
use crate::websocket::send_ledger_notifications;
use crate::{AppState, middleware::AuthUser};

// Crypto quote query
#[derive(Deserialize)]
pub struct CryptoQuoteParams {
    /// CoinGecko asset id, e.g. "bitcoin"
    pub asset: String,
    pub side: TradeSide,
    pub units: Decimal,
}

// Crypto quote response
#[derive(Serialize)]
pub struct CryptoQuoteResponse {
    pub success: bool,
    pub asset: String,
    pub side: TradeSide,
    pub units: Decimal,
    pub live_usd: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
}

// Price a trade without committing to it
pub async fn get_quote(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<CryptoQuoteParams>,
) -> ApiResult<(StatusCode, Json<CryptoQuoteResponse>)> {
    let (live_usd, quote) = quote_trade(&state, &params.asset, params.side, params.units).await?;
    let response = CryptoQuoteResponse {
        success: true,
        asset: params.asset,
        side: params.side,
        units: params.units,
        live_usd,
        unit_price: quote.unit_price,
        total: quote.total,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Crypto trade request
#[derive(Deserialize)]
pub struct CryptoTradeRequest {
    pub asset: String,
    pub side: TradeSide,
    pub units: Decimal,
    /// Destination address for buys.
    pub wallet_address: Option<String>,
    pub reference: Option<String>,
}

// Crypto trade response
#[derive(Serialize)]
pub struct CryptoTradeResponse {
    pub success: bool,
    pub message: String,
    pub transaction: Transaction,
    pub unit_price: Decimal,
    pub total: Decimal,
}

// Place a trade at the current quote
pub async fn place_trade(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CryptoTradeRequest>,
) -> ApiResult<(StatusCode, Json<CryptoTradeResponse>)> {
    let wallet_address = match payload.side {
        TradeSide::Buy => {
            let address = payload
                .wallet_address
                .as_deref()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| {
                    ApiError::Validation("wallet_address is required for buys".to_string())
                })?;
            Some(address.to_string())
        }
        TradeSide::Sell => payload.wallet_address.clone(),
    };

    let (live_usd, quote) = quote_trade(&state, &payload.asset, payload.side, payload.units).await?;
    let metadata = json!({
        "asset": payload.asset,
        "side": payload.side,
        "units": payload.units,
        "live_usd": live_usd,
        "unit_price": quote.unit_price,
        "wallet_address": wallet_address,
    });

    let receipt = match payload.side {
        // Buy: debit now, coins dispatched manually, settled by an admin
        TradeSide::Buy => {
            let reference = payload
                .reference
                .clone()
                .unwrap_or_else(|| format!("crypto-buy-{}", Uuid::new_v4()));
            state.storage.debit_for_purchase(
                user.user_id,
                &reference,
                ServiceKind::CryptoBuy,
                quote.total,
                metadata,
                &format!("{} purchase", payload.asset),
            )?
        }
        // Sell: pending credit, paid out once the coins arrive
        TradeSide::Sell => {
            let reference = payload
                .reference
                .clone()
                .unwrap_or_else(|| format!("crypto-sell-{}", Uuid::new_v4()));
            state.storage.credit(
                user.user_id,
                &reference,
                ServiceKind::CryptoSell,
                quote.total,
                metadata,
                TransactionStatus::Pending,
                &format!("{} sale awaiting coins", payload.asset),
            )?
        }
    };

    if !receipt.replayed {
        send_ledger_notifications(&state.notification_manager, &receipt);
    }

    let message = match payload.side {
        TradeSide::Buy => "Trade placed; coins are on the way".to_string(),
        TradeSide::Sell => "Trade placed; send the coins to complete it".to_string(),
    };
    let status = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let response = CryptoTradeResponse {
        success: true,
        message,
        transaction: receipt.transaction,
        unit_price: quote.unit_price,
        total: quote.total,
    };
    Ok((status, Json(response)))
}

// Fetch the live price and apply our pricing to it
async fn quote_trade(
    state: &AppState,
    asset: &str,
    side: TradeSide,
    units: Decimal,
) -> ApiResult<(Decimal, CryptoQuote)> {
    if asset.is_empty() {
        return Err(ApiError::Validation("asset is required".to_string()));
    }
    if units <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "units must be greater than 0".to_string(),
        ));
    }

    let live_usd = state.upstream.spot_price(asset).await?;
    let quote = {
        let rates = state.rates.lock().unwrap();
        rates.crypto.quote(side, live_usd, units)?
    };
    Ok((live_usd, quote))
}
