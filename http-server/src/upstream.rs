//! Provider integrations: the VTU aggregator, bank account resolution and
//! crypto spot prices.
//!
//! `Upstream::Ebills` talks to the live aggregator API; `Upstream::Sandbox`
//! is a deterministic in-process stand-in used by local development and the
//! test suite. Every purchase call carries the ledger reference so retries
//! land on the same provider order.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::UpstreamConfig;
use crate::error::ApiError;

const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider-side record of a fulfilled (or queued) order.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamReceipt {
    pub order_id: String,
    pub status: String,
    /// Full provider payload: tokens, pins and anything else it returned.
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerInfo {
    pub customer_name: String,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BankAccount {
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
}

#[derive(Clone)]
pub enum Upstream {
    Ebills(EbillsClient),
    Sandbox(SandboxProvider),
}

impl Upstream {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ApiError> {
        match config {
            UpstreamConfig::Sandbox => Ok(Upstream::Sandbox(SandboxProvider)),
            UpstreamConfig::Live { base_url, api_key } => Ok(Upstream::Ebills(EbillsClient::new(
                base_url.clone(),
                api_key.clone(),
            )?)),
        }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, Upstream::Sandbox(_))
    }

    /// Float available on our aggregator account, in naira.
    pub async fn balance(&self) -> Result<Decimal, ApiError> {
        match self {
            Upstream::Ebills(client) => client.balance().await,
            Upstream::Sandbox(sandbox) => Ok(sandbox.balance()),
        }
    }

    pub async fn verify_meter(
        &self,
        disco: &str,
        meter_no: &str,
        meter_type: &str,
    ) -> Result<CustomerInfo, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "verify-customer",
                        json!({
                            "service": disco,
                            "meterNo": meter_no,
                            "metertype": meter_type,
                        }),
                    )
                    .await?;
                Ok(customer_info(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.verify(meter_no),
        }
    }

    pub async fn verify_smartcard(
        &self,
        provider: &str,
        smartcard: &str,
    ) -> Result<CustomerInfo, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "verify-customer",
                        json!({ "service": provider, "smartcardNo": smartcard }),
                    )
                    .await?;
                Ok(customer_info(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.verify(smartcard),
        }
    }

    pub async fn verify_betting_customer(
        &self,
        provider: &str,
        customer_id: &str,
    ) -> Result<CustomerInfo, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "verify-customer",
                        json!({ "service": provider, "customerId": customer_id }),
                    )
                    .await?;
                Ok(customer_info(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.verify(customer_id),
        }
    }

    pub async fn buy_airtime(
        &self,
        network: &str,
        phone: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "airtime",
                        json!({
                            "service": "airtime",
                            "network": network,
                            "phone": phone,
                            "amount": amount,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.fulfill("airtime", phone),
        }
    }

    pub async fn buy_data(
        &self,
        network: &str,
        phone: &str,
        plan_code: &str,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "data",
                        json!({
                            "service": "data",
                            "network": network,
                            "phone": phone,
                            "variation_code": plan_code,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.fulfill("data", phone),
        }
    }

    pub async fn buy_tv(
        &self,
        provider: &str,
        smartcard: &str,
        package_code: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "tv",
                        json!({
                            "service": provider,
                            "smartcardNo": smartcard,
                            "variation_code": package_code,
                            "amount": amount,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.fulfill("tv", smartcard),
        }
    }

    pub async fn buy_electricity(
        &self,
        disco: &str,
        meter_no: &str,
        meter_type: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "electricity",
                        json!({
                            "service": disco,
                            "meterNo": meter_no,
                            "metertype": meter_type,
                            "amount": amount,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.fulfill_electricity(meter_no),
        }
    }

    pub async fn buy_exam_pins(
        &self,
        exam: &str,
        quantity: u32,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "exam",
                        json!({
                            "service": exam,
                            "quantity": quantity,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => Ok(sandbox.fulfill_exam(exam, quantity)),
        }
    }

    pub async fn fund_betting(
        &self,
        provider: &str,
        customer_id: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "betting",
                        json!({
                            "service": provider,
                            "customerId": customer_id,
                            "amount": amount,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.fulfill("betting", customer_id),
        }
    }

    /// What the SMM panel charges us for an order, before our margin.
    pub async fn smm_price(&self, service_id: u64, quantity: u32) -> Result<Decimal, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .get(
                        "smm/price",
                        &[
                            ("serviceId", service_id.to_string()),
                            ("quantity", quantity.to_string()),
                        ],
                    )
                    .await?;
                decimal_field(&data, "price")
            }
            Upstream::Sandbox(sandbox) => Ok(sandbox.smm_price(quantity)),
        }
    }

    pub async fn place_smm_order(
        &self,
        service_id: u64,
        link: &str,
        quantity: u32,
        reference: &str,
    ) -> Result<UpstreamReceipt, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .post(
                        "smm/order",
                        json!({
                            "serviceId": service_id,
                            "link": link,
                            "quantity": quantity,
                            "ref": reference,
                        }),
                    )
                    .await?;
                Ok(receipt(data))
            }
            Upstream::Sandbox(sandbox) => sandbox.fulfill("smm", link),
        }
    }

    pub async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<BankAccount, ApiError> {
        match self {
            Upstream::Ebills(client) => {
                let data = client
                    .get(
                        "bank/resolve",
                        &[
                            ("account_number", account_number.to_string()),
                            ("bank_code", bank_code.to_string()),
                        ],
                    )
                    .await?;
                let account_name = data["account_name"]
                    .as_str()
                    .ok_or_else(|| {
                        ApiError::Upstream("missing account_name in resolve response".to_string())
                    })?
                    .to_string();
                Ok(BankAccount {
                    account_number: account_number.to_string(),
                    account_name,
                    bank_code: bank_code.to_string(),
                })
            }
            Upstream::Sandbox(sandbox) => sandbox.resolve_account(account_number, bank_code),
        }
    }

    /// USD spot price for a CoinGecko asset id.
    pub async fn spot_price(&self, asset: &str) -> Result<Decimal, ApiError> {
        match self {
            Upstream::Ebills(client) => client.spot_price(asset).await,
            Upstream::Sandbox(sandbox) => sandbox.spot_price(asset),
        }
    }
}

#[derive(Clone)]
pub struct EbillsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EbillsClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// POST and unwrap the aggregator envelope: `{ success, data }` on
    /// success, `{ success: false, message }` on failure.
    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let mut payload: Value = response.json().await?;
        if !status.is_success() || !payload["success"].as_bool().unwrap_or(false) {
            let message = payload["message"]
                .as_str()
                .unwrap_or("request rejected")
                .to_string();
            return Err(ApiError::Upstream(message));
        }
        Ok(payload["data"].take())
    }

    async fn balance(&self) -> Result<Decimal, ApiError> {
        let data = self.get("balance", &[]).await?;
        decimal_field(&data, "balance")
    }

    async fn spot_price(&self, asset: &str) -> Result<Decimal, ApiError> {
        let payload: Value = self
            .http
            .get(COINGECKO_URL)
            .query(&[("ids", asset), ("vs_currencies", "usd")])
            .send()
            .await?
            .json()
            .await?;
        payload[asset]["usd"]
            .as_f64()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| ApiError::Upstream(format!("no USD price for asset '{asset}'")))
    }
}

fn receipt(data: Value) -> UpstreamReceipt {
    let order_id = data["order_id"]
        .as_str()
        .or_else(|| data["orderId"].as_str())
        .unwrap_or_default()
        .to_string();
    let status = data["status"].as_str().unwrap_or("processing").to_string();
    UpstreamReceipt {
        order_id,
        status,
        raw: data,
    }
}

fn customer_info(data: Value) -> CustomerInfo {
    let customer_name = data["customer_name"]
        .as_str()
        .or_else(|| data["name"].as_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    CustomerInfo {
        customer_name,
        raw: data,
    }
}

fn decimal_field(data: &Value, key: &str) -> Result<Decimal, ApiError> {
    let value = &data[key];
    value
        .as_str()
        .and_then(|s| Decimal::from_str(s).ok())
        .or_else(|| value.as_f64().and_then(Decimal::from_f64))
        .ok_or_else(|| ApiError::Upstream(format!("missing numeric field '{key}'")))
}

/// Offline provider. Identifiers starting with `fail` are rejected, which is
/// how the test suite exercises the refund path.
#[derive(Clone)]
pub struct SandboxProvider;

impl SandboxProvider {
    fn order_id(&self) -> String {
        use rand::Rng;
        format!("SBX-{:08}", rand::thread_rng().gen_range(0..100_000_000u64))
    }

    fn balance(&self) -> Decimal {
        Decimal::from(5_000_000)
    }

    fn verify(&self, target: &str) -> Result<CustomerInfo, ApiError> {
        if target.starts_with("fail") {
            return Err(ApiError::Upstream("sandbox: customer not found".to_string()));
        }
        Ok(CustomerInfo {
            customer_name: "SANDBOX CUSTOMER".to_string(),
            raw: json!({ "customer_name": "SANDBOX CUSTOMER", "target": target }),
        })
    }

    fn fulfill(&self, service: &str, target: &str) -> Result<UpstreamReceipt, ApiError> {
        if target.starts_with("fail") {
            return Err(ApiError::Upstream("sandbox: delivery failed".to_string()));
        }
        let order_id = self.order_id();
        let raw = json!({
            "order_id": order_id.clone(),
            "service": service,
            "status": "completed",
        });
        Ok(UpstreamReceipt {
            order_id,
            status: "completed".to_string(),
            raw,
        })
    }

    fn fulfill_electricity(&self, meter_no: &str) -> Result<UpstreamReceipt, ApiError> {
        let mut receipt = self.fulfill("electricity", meter_no)?;
        receipt.raw["token"] = json!("1234-5678-9012-3456");
        Ok(receipt)
    }

    fn fulfill_exam(&self, exam: &str, quantity: u32) -> UpstreamReceipt {
        let order_id = self.order_id();
        let pins: Vec<String> = (0..quantity)
            .map(|i| format!("PIN-{exam}-{i:04}"))
            .collect();
        let raw = json!({
            "order_id": order_id.clone(),
            "service": exam,
            "status": "completed",
            "pins": pins,
        });
        UpstreamReceipt {
            order_id,
            status: "completed".to_string(),
            raw,
        }
    }

    // NGN 900 per thousand units
    fn smm_price(&self, quantity: u32) -> Decimal {
        (Decimal::from(quantity) * Decimal::from(900) / Decimal::from(1000)).round_dp(2)
    }

    fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<BankAccount, ApiError> {
        if account_number.starts_with("fail") {
            return Err(ApiError::Upstream(
                "sandbox: could not resolve account".to_string(),
            ));
        }
        Ok(BankAccount {
            account_number: account_number.to_string(),
            account_name: "SANDBOX ACCOUNT".to_string(),
            bank_code: bank_code.to_string(),
        })
    }

    fn spot_price(&self, asset: &str) -> Result<Decimal, ApiError> {
        let usd = match asset {
            "bitcoin" => Decimal::from(64_000),
            "ethereum" => Decimal::from(3_100),
            "tether" => Decimal::ONE,
            _ => return Err(ApiError::Upstream(format!("unknown asset '{asset}'"))),
        };
        Ok(usd)
    }
}
