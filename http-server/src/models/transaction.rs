use pricing::types::{ServiceKind, TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Whether the transaction moves money out of or into the wallet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Client-supplied idempotency reference, unique per user.
    pub reference: String,
    pub user_id: u64,
    pub service: ServiceKind,
    pub direction: Direction,
    pub amount: Decimal,
    pub status: TransactionStatus,
    /// Request details: phone number, plan code, meter number and so on.
    pub metadata: Value,
    pub upstream_order_id: Option<String>,
    pub message: String,
    pub created_at: u64,
    pub updated_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_direction_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::Debit).unwrap(), "\"debit\"");
        assert_eq!(
            serde_json::to_string(&Direction::Credit).unwrap(),
            "\"credit\""
        );
    }

    #[test]
    fn test_transaction_serializes_for_clients() {
        let tx = Transaction {
            id: Uuid::nil(),
            reference: "ref-001".to_string(),
            user_id: 7,
            service: ServiceKind::Airtime,
            direction: Direction::Debit,
            amount: dec!(1000),
            status: TransactionStatus::Pending,
            metadata: json!({ "network": "mtn", "phone": "08030000000" }),
            upstream_order_id: None,
            message: "awaiting provider".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["service"], "airtime");
        assert_eq!(json["direction"], "debit");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["metadata"]["network"], "mtn");
    }
}
