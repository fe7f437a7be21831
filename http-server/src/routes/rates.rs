//! Rate catalog for purchase forms, and the admin's full rate editor.
//!
//! The public catalog carries final prices only. The admin view exposes the
//! raw tables with provider costs and margins, and updates replace one
//! section at a time after whole-table validation.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use pricing::rates::{PlanTable, RateSettings};
use pricing::types::ChargeType;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, middleware::AdminUser};

// One purchasable plan with its final price
#[derive(Serialize)]
pub struct CatalogPlan {
    pub code: String,
    pub name: String,
    pub price: Decimal,
}

// Betting charge as shown to users
#[derive(Serialize)]
pub struct CatalogBettingCharge {
    pub charge_type: ChargeType,
    pub value: Decimal,
}

// Public catalog response
#[derive(Serialize)]
pub struct CatalogResponse {
    pub success: bool,
    pub airtime_networks: Vec<String>,
    pub data: HashMap<String, Vec<CatalogPlan>>,
    pub cable: HashMap<String, Vec<CatalogPlan>>,
    pub exam_cards: Vec<CatalogPlan>,
    pub airtime_cash_rates: HashMap<String, Decimal>,
    pub betting: CatalogBettingCharge,
}

fn catalog_plans(table: &PlanTable) -> Vec<CatalogPlan> {
    table
        .plans()
        .iter()
        .map(|plan| CatalogPlan {
            code: plan.code.clone(),
            name: plan.name.clone(),
            price: plan.final_price(),
        })
        .collect()
}

// What the purchase forms need: plans and final prices, no margins
pub async fn get_catalog(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<CatalogResponse>)> {
    let settings = {
        let rates = state.rates.lock().unwrap();
        rates.clone()
    };

    let mut airtime_networks: Vec<String> = settings.airtime.keys().cloned().collect();
    airtime_networks.sort();

    let data = settings
        .data
        .iter()
        .map(|(network, table)| (network.clone(), catalog_plans(table)))
        .collect();
    let cable = settings
        .cable
        .iter()
        .map(|(provider, table)| (provider.clone(), catalog_plans(table)))
        .collect();
    let airtime_cash_rates = settings
        .airtime_cash
        .networks()
        .map(|(network, rate)| (network.to_string(), rate))
        .collect();

    let response = CatalogResponse {
        success: true,
        airtime_networks,
        data,
        cable,
        exam_cards: catalog_plans(&settings.exam_cards),
        airtime_cash_rates,
        betting: CatalogBettingCharge {
            charge_type: settings.betting.charge_type,
            value: settings.betting.value,
        },
    };
    Ok((StatusCode::OK, Json(response)))
}

// Admin rate settings response
#[derive(Serialize)]
pub struct RateSettingsResponse {
    pub success: bool,
    pub rates: RateSettings,
}

// Full rate tables, margins and provider costs included
pub async fn get_rates(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<(StatusCode, Json<RateSettingsResponse>)> {
    let rates = {
        let settings = state.rates.lock().unwrap();
        settings.clone()
    };
    let response = RateSettingsResponse {
        success: true,
        rates,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Rate update response
#[derive(Serialize)]
pub struct RateUpdateResponse {
    pub success: bool,
    pub message: String,
    pub rates: RateSettings,
}

// Replace one rate section. The whole table is validated on a draft first so
// a bad payload never half-applies.
pub async fn update_rates(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(section): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<RateUpdateResponse>)> {
    let mut settings = state.rates.lock().unwrap();
    let mut draft = settings.clone();
    apply_section(&mut draft, &section, body)?;
    draft.validate()?;
    *settings = draft.clone();

    tracing::info!("rate section '{}' updated", section);
    let response = RateUpdateResponse {
        success: true,
        message: format!("Section '{section}' updated"),
        rates: draft,
    };
    Ok((StatusCode::OK, Json(response)))
}

fn apply_section(settings: &mut RateSettings, section: &str, body: Value) -> Result<(), ApiError> {
    match section {
        "airtime" => settings.airtime = parse(body)?,
        "airtime_cash" => settings.airtime_cash = parse(body)?,
        "data" => settings.data = parse(body)?,
        "cable" => settings.cable = parse(body)?,
        "electricity" => settings.electricity = parse(body)?,
        "exam_cards" => settings.exam_cards = parse(body)?,
        "smm" => settings.smm = parse(body)?,
        "betting" => settings.betting = parse(body)?,
        "crypto" => settings.crypto = parse(body)?,
        "gift_cards" => settings.gift_cards = parse(body)?,
        other => {
            return Err(ApiError::Validation(format!(
                "Unknown rate section '{other}'"
            )));
        }
    }
    Ok(())
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::Validation(format!("Invalid rate payload: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_apply_betting_section() {
        let mut settings = RateSettings::seed();
        apply_section(
            &mut settings,
            "betting",
            json!({ "charge_type": "percent", "value": "2" }),
        )
        .unwrap();
        settings.validate().unwrap();

        let quote = settings.betting_quote(dec!(1000)).unwrap();
        assert_eq!(quote.service_charge, dec!(20.00));
        assert_eq!(quote.total, dec!(1020.00));
    }

    #[test]
    fn test_apply_rejects_unknown_section() {
        let mut settings = RateSettings::seed();
        let err = apply_section(&mut settings, "lottery", json!({})).unwrap_err();
        assert!(err.to_string().contains("Unknown rate section"));
    }

    #[test]
    fn test_apply_rejects_malformed_payload() {
        let mut settings = RateSettings::seed();
        let err =
            apply_section(&mut settings, "electricity", json!({ "margin": true })).unwrap_err();
        assert!(err.to_string().contains("Invalid rate payload"));
    }

    #[test]
    fn test_overlapping_tiers_fail_validation() {
        let mut settings = RateSettings::seed();
        apply_section(
            &mut settings,
            "gift_cards",
            json!([{
                "brand": "amazon",
                "currency": "USD",
                "tiers": [
                    { "min": "25", "max": "100", "rate": "1050" },
                    { "min": "90", "max": "200", "rate": "1120" }
                ]
            }]),
        )
        .unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_catalog_plans_use_final_prices() {
        let settings = RateSettings::seed();
        let plans = catalog_plans(&settings.exam_cards);
        let waec = plans.iter().find(|p| p.code == "waec").unwrap();
        // 3400 with a 10 percent margin
        assert_eq!(waec.price, dec!(3740.00));
    }
}
