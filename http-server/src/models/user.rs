use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Unverified,
    Pending,
    Verified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    pub session_id: String,
    pub email: String,
    /// Naira balance, two decimal places.
    pub wallet: Decimal,
    pub email_verified: bool,
    pub kyc_status: KycStatus,
    pub is_admin: bool,
    pub created_at: u64,
}

/// Starting balance for new accounts so the demo flows work out of the box.
pub fn default_wallet() -> Decimal {
    Decimal::from(50_000) // Give users NGN 50,000 to start
}

/// User shape returned to clients. Never carries the session id.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: u64,
    pub email: String,
    pub wallet: Decimal,
    pub email_verified: bool,
    pub kyc_status: KycStatus,
    pub is_admin: bool,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            wallet: user.wallet,
            email_verified: user.email_verified,
            kyc_status: user.kyc_status,
            is_admin: user.is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kyc_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&KycStatus::Unverified).unwrap(),
            "\"unverified\""
        );
        assert_eq!(
            serde_json::to_string(&KycStatus::Verified).unwrap(),
            "\"verified\""
        );
    }

    #[test]
    fn test_authenticated_user_drops_session_id() {
        let user = User {
            user_id: 1,
            session_id: "abc123".to_string(),
            email: "user@example.com".to_string(),
            wallet: default_wallet(),
            email_verified: false,
            kyc_status: KycStatus::Unverified,
            is_admin: false,
            created_at: 0,
        };
        let public: AuthenticatedUser = user.into();
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("session_id").is_none());
        assert_eq!(json["email"], "user@example.com");
        assert_eq!(json["wallet"], serde_json::json!("50000"));
    }
}
