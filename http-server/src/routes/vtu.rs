//! VTU purchases: the airtime/data/TV dispatcher plus electricity, exam
//! cards and SMM orders.
//!
//! Every purchase follows the same ledger discipline: quote from the rate
//! table, debit the wallet together with a pending transaction, call the
//! provider, then settle the transaction from the provider outcome. A failed
//! provider call settles as failed, which refunds the debit.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use pricing::rates::RateSettings;
use pricing::types::ServiceKind;

use crate::error::{ApiError, ApiResult};
use crate::models::Transaction;
use crate::websocket::send_ledger_notifications;
use crate::{AppState, middleware::AuthUser};

use super::{ensure_float, settle_after_upstream};

// Unified VTU purchase request
#[derive(Deserialize)]
pub struct VtuTransactionRequest {
    /// "airtime", "data" or "tv"
    pub service: String,
    pub network: Option<String>,
    pub phone: Option<String>,
    pub plan_code: Option<String>,
    pub provider: Option<String>,
    pub smartcard: Option<String>,
    pub package_code: Option<String>,
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
}

// Unified VTU purchase response
#[derive(Serialize)]
pub struct VtuTransactionResponse {
    pub success: bool,
    #[serde(rename = "transactionId")]
    pub transaction_id: Uuid,
    #[serde(rename = "transactionData")]
    pub transaction_data: Transaction,
}

// A validated and priced VTU order, ready to debit and dispatch
#[derive(Debug)]
struct PreparedVtu {
    service: ServiceKind,
    price: Decimal,
    upstream_amount: Decimal,
    description: String,
    metadata: Value,
    call: VtuCall,
}

#[derive(Debug)]
enum VtuCall {
    Airtime {
        network: String,
        phone: String,
        amount: Decimal,
    },
    Data {
        network: String,
        phone: String,
        plan_code: String,
    },
    Tv {
        provider: String,
        smartcard: String,
        package_code: String,
        amount: Decimal,
    },
}

fn require<'a>(field: &'a Option<String>, name: &str, service: &str) -> Result<&'a str, ApiError> {
    field
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{name} is required for {service} purchases")))
}

// Validate the request and price it against the rate tables
fn prepare_vtu(
    rates: &RateSettings,
    payload: &VtuTransactionRequest,
) -> Result<PreparedVtu, ApiError> {
    match payload.service.as_str() {
        "airtime" => {
            let network = require(&payload.network, "network", "airtime")?;
            let phone = require(&payload.phone, "phone", "airtime")?;
            let amount = payload.amount.ok_or_else(|| {
                ApiError::Validation("amount is required for airtime purchases".to_string())
            })?;
            let quote = rates.airtime_quote(network, amount)?;
            Ok(PreparedVtu {
                service: ServiceKind::Airtime,
                price: quote.price,
                upstream_amount: quote.upstream_amount,
                description: format!("{network} airtime"),
                metadata: json!({ "network": network, "phone": phone, "amount": amount }),
                call: VtuCall::Airtime {
                    network: network.to_string(),
                    phone: phone.to_string(),
                    amount: quote.upstream_amount,
                },
            })
        }
        "data" => {
            let network = require(&payload.network, "network", "data")?;
            let phone = require(&payload.phone, "phone", "data")?;
            let plan_code = require(&payload.plan_code, "plan_code", "data")?;
            let (plan, quote) = rates.data_quote(network, plan_code)?;
            Ok(PreparedVtu {
                service: ServiceKind::Data,
                price: quote.price,
                upstream_amount: quote.upstream_amount,
                description: format!("{} ({network})", plan.name),
                metadata: json!({
                    "network": network,
                    "phone": phone,
                    "plan_code": plan_code,
                    "plan_name": plan.name,
                }),
                call: VtuCall::Data {
                    network: network.to_string(),
                    phone: phone.to_string(),
                    plan_code: plan_code.to_string(),
                },
            })
        }
        "tv" => {
            let provider = require(&payload.provider, "provider", "tv")?;
            let smartcard = require(&payload.smartcard, "smartcard", "tv")?;
            let package_code = require(&payload.package_code, "package_code", "tv")?;
            let (package, quote) = rates.cable_quote(provider, package_code)?;
            Ok(PreparedVtu {
                service: ServiceKind::CableTv,
                price: quote.price,
                upstream_amount: quote.upstream_amount,
                description: format!("{} ({provider})", package.name),
                metadata: json!({
                    "provider": provider,
                    "smartcard": smartcard,
                    "package_code": package_code,
                    "package_name": package.name,
                }),
                call: VtuCall::Tv {
                    provider: provider.to_string(),
                    smartcard: smartcard.to_string(),
                    package_code: package_code.to_string(),
                    amount: quote.upstream_amount,
                },
            })
        }
        other => Err(ApiError::Validation(format!(
            "Service '{other}' not supported"
        ))),
    }
}

// Unified VTU purchase endpoint
pub async fn vtu_transaction(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<VtuTransactionRequest>,
) -> ApiResult<(StatusCode, Json<VtuTransactionResponse>)> {
    let prepared = {
        let rates = state.rates.lock().unwrap();
        prepare_vtu(&rates, &payload)?
    };

    // Check our float before taking the user's money
    ensure_float(&state, prepared.upstream_amount).await?;

    let reference = payload
        .reference
        .clone()
        .unwrap_or_else(|| format!("vtu-{}", Uuid::new_v4()));
    let receipt = state.storage.debit_for_purchase(
        user.user_id,
        &reference,
        prepared.service,
        prepared.price,
        prepared.metadata.clone(),
        &prepared.description,
    )?;
    if receipt.replayed {
        let response = VtuTransactionResponse {
            success: true,
            transaction_id: receipt.transaction.id,
            transaction_data: receipt.transaction,
        };
        return Ok((StatusCode::OK, Json(response)));
    }
    send_ledger_notifications(&state.notification_manager, &receipt);

    let transaction_id = receipt.transaction.id;
    let result = match prepared.call {
        VtuCall::Airtime {
            network,
            phone,
            amount,
        } => {
            state
                .upstream
                .buy_airtime(&network, &phone, amount, &reference)
                .await
        }
        VtuCall::Data {
            network,
            phone,
            plan_code,
        } => {
            state
                .upstream
                .buy_data(&network, &phone, &plan_code, &reference)
                .await
        }
        VtuCall::Tv {
            provider,
            smartcard,
            package_code,
            amount,
        } => {
            state
                .upstream
                .buy_tv(&provider, &smartcard, &package_code, amount, &reference)
                .await
        }
    };

    let (transaction, _) =
        settle_after_upstream(&state, user.user_id, transaction_id, result).await?;
    let response = VtuTransactionResponse {
        success: true,
        transaction_id: transaction.id,
        transaction_data: transaction,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// Meter verification request
#[derive(Deserialize)]
pub struct MeterVerifyRequest {
    /// Disco identifier, e.g. "ikeja-electric"
    pub service: String,
    #[serde(rename = "meterNo")]
    pub meter_no: String,
    #[serde(rename = "metertype")]
    pub meter_type: String,
}

// Meter verification response
#[derive(Serialize)]
pub struct MeterVerifyResponse {
    pub success: bool,
    pub customer_name: String,
    pub message: String,
}

// Verify a meter number before purchase
pub async fn verify_meter(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(payload): Json<MeterVerifyRequest>,
) -> ApiResult<(StatusCode, Json<MeterVerifyResponse>)> {
    validate_meter_type(&payload.meter_type)?;
    if payload.meter_no.is_empty() {
        return Err(ApiError::Validation("meterNo is required".to_string()));
    }

    let customer = state
        .upstream
        .verify_meter(&payload.service, &payload.meter_no, &payload.meter_type)
        .await?;
    let response = MeterVerifyResponse {
        success: true,
        customer_name: customer.customer_name,
        message: "Meter verified".to_string(),
    };
    Ok((StatusCode::OK, Json(response)))
}

// Electricity purchase request
#[derive(Deserialize)]
pub struct ElectricityPurchaseRequest {
    pub service: String,
    #[serde(rename = "meterNo")]
    pub meter_no: String,
    #[serde(rename = "metertype")]
    pub meter_type: String,
    pub amount: Decimal,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

// Electricity purchase response
#[derive(Serialize)]
pub struct ElectricityPurchaseResponse {
    pub success: bool,
    pub transaction: Transaction,
    /// Prepaid recharge token, when the disco returns one.
    pub token: Option<String>,
}

// Buy electricity units for a verified meter
pub async fn buy_electricity(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ElectricityPurchaseRequest>,
) -> ApiResult<(StatusCode, Json<ElectricityPurchaseResponse>)> {
    validate_meter_type(&payload.meter_type)?;
    if payload.meter_no.is_empty() {
        return Err(ApiError::Validation("meterNo is required".to_string()));
    }

    let quote = {
        let rates = state.rates.lock().unwrap();
        rates.electricity_quote(payload.amount)?
    };
    ensure_float(&state, quote.upstream_amount).await?;

    let reference = payload
        .reference
        .clone()
        .unwrap_or_else(|| format!("elec-{}", Uuid::new_v4()));
    let receipt = state.storage.debit_for_purchase(
        user.user_id,
        &reference,
        ServiceKind::Electricity,
        quote.price,
        json!({
            "service": payload.service,
            "meter_no": payload.meter_no,
            "meter_type": payload.meter_type,
            "amount": payload.amount,
        }),
        &format!("{} electricity", payload.service),
    )?;
    if receipt.replayed {
        let token = token_from_metadata(&receipt.transaction);
        let response = ElectricityPurchaseResponse {
            success: true,
            transaction: receipt.transaction,
            token,
        };
        return Ok((StatusCode::OK, Json(response)));
    }
    send_ledger_notifications(&state.notification_manager, &receipt);

    let transaction_id = receipt.transaction.id;
    let result = state
        .upstream
        .buy_electricity(
            &payload.service,
            &payload.meter_no,
            &payload.meter_type,
            quote.upstream_amount,
            &reference,
        )
        .await;
    let (transaction, provider_receipt) =
        settle_after_upstream(&state, user.user_id, transaction_id, result).await?;

    let token = provider_receipt.raw["token"].as_str().map(String::from);
    let response = ElectricityPurchaseResponse {
        success: true,
        transaction,
        token,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

fn validate_meter_type(meter_type: &str) -> Result<(), ApiError> {
    match meter_type {
        "prepaid" | "postpaid" => Ok(()),
        other => Err(ApiError::Validation(format!(
            "metertype must be 'prepaid' or 'postpaid', got '{other}'"
        ))),
    }
}

fn token_from_metadata(transaction: &Transaction) -> Option<String> {
    transaction.metadata["token"].as_str().map(String::from)
}

// Exam card price query
#[derive(Deserialize)]
pub struct ExamPriceParams {
    pub exam: String,
    pub quantity: u32,
}

// Exam card price response
#[derive(Serialize)]
pub struct ExamPriceResponse {
    pub success: bool,
    pub exam: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total: Decimal,
}

// Price exam result-checker cards before purchase
pub async fn exam_price(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<ExamPriceParams>,
) -> ApiResult<(StatusCode, Json<ExamPriceResponse>)> {
    let (plan, quote) = {
        let rates = state.rates.lock().unwrap();
        rates.exam_quote(&params.exam, params.quantity)?
    };
    let unit_price = plan.final_price();
    let response = ExamPriceResponse {
        success: true,
        exam: params.exam,
        name: plan.name,
        unit_price,
        quantity: params.quantity,
        total: quote.price,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Exam card purchase request
#[derive(Deserialize)]
pub struct ExamPurchaseRequest {
    pub exam: String,
    pub quantity: u32,
    pub reference: Option<String>,
}

// Exam card purchase response
#[derive(Serialize)]
pub struct ExamPurchaseResponse {
    pub success: bool,
    pub transaction: Transaction,
    /// Result-checker pins delivered by the provider.
    pub pins: Value,
}

// Buy exam result-checker cards
pub async fn buy_exam_cards(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ExamPurchaseRequest>,
) -> ApiResult<(StatusCode, Json<ExamPurchaseResponse>)> {
    let (plan, quote) = {
        let rates = state.rates.lock().unwrap();
        rates.exam_quote(&payload.exam, payload.quantity)?
    };
    ensure_float(&state, quote.upstream_amount).await?;

    let reference = payload
        .reference
        .clone()
        .unwrap_or_else(|| format!("exam-{}", Uuid::new_v4()));
    let receipt = state.storage.debit_for_purchase(
        user.user_id,
        &reference,
        ServiceKind::ExamCard,
        quote.price,
        json!({
            "exam": payload.exam,
            "name": plan.name,
            "quantity": payload.quantity,
        }),
        &format!("{} result checker", payload.exam),
    )?;
    if receipt.replayed {
        let response = ExamPurchaseResponse {
            success: true,
            transaction: receipt.transaction,
            pins: Value::Null,
        };
        return Ok((StatusCode::OK, Json(response)));
    }
    send_ledger_notifications(&state.notification_manager, &receipt);

    let transaction_id = receipt.transaction.id;
    let result = state
        .upstream
        .buy_exam_pins(&payload.exam, payload.quantity, &reference)
        .await;
    let (transaction, provider_receipt) =
        settle_after_upstream(&state, user.user_id, transaction_id, result).await?;

    let response = ExamPurchaseResponse {
        success: true,
        transaction,
        pins: provider_receipt.raw["pins"].clone(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// SMM order request
#[derive(Deserialize)]
pub struct SmmOrderRequest {
    pub service_id: u64,
    pub link: String,
    pub quantity: u32,
    pub reference: Option<String>,
}

// SMM order response
#[derive(Serialize)]
pub struct SmmOrderResponse {
    pub success: bool,
    pub transaction: Transaction,
    pub charged: Decimal,
}

// Place a social media boost order
pub async fn place_smm_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SmmOrderRequest>,
) -> ApiResult<(StatusCode, Json<SmmOrderResponse>)> {
    if payload.link.is_empty() {
        return Err(ApiError::Validation("link is required".to_string()));
    }
    if payload.quantity == 0 {
        return Err(ApiError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    // Panel cost first; our margin goes on top of it
    let panel_cost = state
        .upstream
        .smm_price(payload.service_id, payload.quantity)
        .await?;
    let quote = {
        let rates = state.rates.lock().unwrap();
        rates.smm_quote(panel_cost)?
    };
    ensure_float(&state, quote.upstream_amount).await?;

    let reference = payload
        .reference
        .clone()
        .unwrap_or_else(|| format!("smm-{}", Uuid::new_v4()));
    let receipt = state.storage.debit_for_purchase(
        user.user_id,
        &reference,
        ServiceKind::Smm,
        quote.price,
        json!({
            "service_id": payload.service_id,
            "link": payload.link,
            "quantity": payload.quantity,
            "panel_cost": panel_cost,
        }),
        "social media order",
    )?;
    if receipt.replayed {
        let charged = receipt.transaction.amount;
        let response = SmmOrderResponse {
            success: true,
            transaction: receipt.transaction,
            charged,
        };
        return Ok((StatusCode::OK, Json(response)));
    }
    send_ledger_notifications(&state.notification_manager, &receipt);

    let transaction_id = receipt.transaction.id;
    let result = state
        .upstream
        .place_smm_order(payload.service_id, &payload.link, payload.quantity, &reference)
        .await;
    let (transaction, _) =
        settle_after_upstream(&state, user.user_id, transaction_id, result).await?;

    let charged = transaction.amount;
    let response = SmmOrderResponse {
        success: true,
        transaction,
        charged,
    };
    Ok((StatusCode::CREATED, Json(response)))
}
