use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Service categories a wallet transaction can belong to.
///
/// Wire names are snake_case and are stored verbatim on transaction records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Airtime,
    Data,
    CableTv,
    Electricity,
    ExamCard,
    Betting,
    Smm,
    CryptoBuy,
    CryptoSell,
    AirtimeCash,
    GiftCard,
    Deposit,
    Withdrawal,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceKind::Airtime => "airtime",
            ServiceKind::Data => "data",
            ServiceKind::CableTv => "cable_tv",
            ServiceKind::Electricity => "electricity",
            ServiceKind::ExamCard => "exam_card",
            ServiceKind::Betting => "betting",
            ServiceKind::Smm => "smm",
            ServiceKind::CryptoBuy => "crypto_buy",
            ServiceKind::CryptoSell => "crypto_sell",
            ServiceKind::AirtimeCash => "airtime_cash",
            ServiceKind::GiftCard => "gift_card",
            ServiceKind::Deposit => "deposit",
            ServiceKind::Withdrawal => "withdrawal",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a ledger transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    /// Terminal statuses can no longer be settled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }
}

/// How a betting service charge is expressed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    /// A flat naira amount added on top of the funded amount.
    Fixed,
    /// A percentage of the funded amount.
    Percent,
}

/// Direction of a crypto trade.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Priced VTU purchase: what the wallet pays and what goes upstream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct VtuQuote {
    /// Amount deducted from the wallet.
    pub price: Decimal,
    /// Amount forwarded to the aggregator.
    pub upstream_amount: Decimal,
    /// Platform margin (`price - upstream_amount`).
    pub margin: Decimal,
}

/// Airtime-to-cash split for a given airtime amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CashQuote {
    /// Naira credited to the wallet.
    pub amount_received: Decimal,
    /// Naira retained by the platform.
    pub service_fee: Decimal,
}

/// Betting funding total: funded amount plus service charge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct BettingQuote {
    /// Amount deducted from the wallet.
    pub total: Decimal,
    /// Charge portion of the total.
    pub service_charge: Decimal,
}

/// Priced crypto trade.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CryptoQuote {
    /// Final NGN price for one unit of the asset.
    pub unit_price: Decimal,
    /// `units * unit_price`, rounded to kobo.
    pub total: Decimal,
}

/// Gift-card payout resolved from the tier table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutQuote {
    /// Naira paid out for the card.
    pub payout: Decimal,
    /// Rate (naira per unit of face value) the matching tier applied.
    pub rate: Decimal,
}
