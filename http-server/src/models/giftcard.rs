//! Gift card submissions and the negotiation state machine.
//!
//! A submission starts `pending` at the posted rate. Admins may counter-offer
//! (`negotiating`), the user accepts or declines the counter, and admins
//! finalize with approve or reject. Approval pays either the accepted
//! counter-offer or the original quote, depending on the path taken.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Negotiating,
    NegotiationAccepted,
    NegotiationRejected,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Approved | SubmissionStatus::Rejected)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NegotiationAction {
    /// Admin counters with a different rate.
    ProposeRate,
    /// User takes the counter-offer.
    AcceptOffer,
    /// User turns the counter-offer down.
    DeclineOffer,
    /// Admin pays out.
    Approve,
    /// Admin declines the card outright.
    Reject,
}

/// Legal moves in the negotiation flow. Returns `None` for anything else,
/// including every action on a terminal submission.
pub fn next_status(
    current: SubmissionStatus,
    action: NegotiationAction,
) -> Option<SubmissionStatus> {
    use NegotiationAction::*;
    use SubmissionStatus::*;

    match (current, action) {
        (Pending, ProposeRate) => Some(Negotiating),
        (Negotiating, AcceptOffer) => Some(NegotiationAccepted),
        (Negotiating, DeclineOffer) => Some(NegotiationRejected),
        // Approval from pending or a rejected negotiation pays the original
        // quote; approval after an accepted negotiation pays the counter.
        (Pending | NegotiationAccepted | NegotiationRejected, Approve) => Some(Approved),
        (current, Reject) if !current.is_terminal() => Some(Rejected),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GiftCardSubmission {
    pub id: Uuid,
    pub user_id: u64,
    pub brand: String,
    pub currency: String,
    /// Face value of the card in the brand currency.
    pub face_value: Decimal,
    /// Proof images uploaded by the user.
    pub image_urls: Vec<String>,
    /// Naira-per-unit rate at submission time.
    pub rate: Decimal,
    pub expected_payout: Decimal,
    pub proposed_rate: Option<Decimal>,
    pub proposed_payout: Option<Decimal>,
    pub admin_note: Option<String>,
    pub decline_reason: Option<String>,
    pub reject_reason: Option<String>,
    pub status: SubmissionStatus,
    /// Set on approval, pointing at the payout credit.
    pub payout_transaction_id: Option<Uuid>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl GiftCardSubmission {
    /// Amount an approval pays: the accepted counter-offer when one exists,
    /// the original quote otherwise.
    pub fn payout_amount(&self) -> Decimal {
        match self.status {
            SubmissionStatus::NegotiationAccepted => {
                self.proposed_payout.unwrap_or(self.expected_payout)
            }
            _ => self.expected_payout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NegotiationAction::*;
    use super::SubmissionStatus::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_happy_negotiation_path() {
        assert_eq!(next_status(Pending, ProposeRate), Some(Negotiating));
        assert_eq!(next_status(Negotiating, AcceptOffer), Some(NegotiationAccepted));
        assert_eq!(next_status(NegotiationAccepted, Approve), Some(Approved));
    }

    #[test]
    fn test_declined_offer_can_still_be_approved_or_rejected() {
        assert_eq!(next_status(Negotiating, DeclineOffer), Some(NegotiationRejected));
        assert_eq!(next_status(NegotiationRejected, Approve), Some(Approved));
        assert_eq!(next_status(NegotiationRejected, Reject), Some(Rejected));
    }

    #[test]
    fn test_direct_approval_without_negotiation() {
        assert_eq!(next_status(Pending, Approve), Some(Approved));
        assert_eq!(next_status(Pending, Reject), Some(Rejected));
    }

    #[test]
    fn test_illegal_moves_are_refused() {
        // User cannot accept an offer that was never made.
        assert_eq!(next_status(Pending, AcceptOffer), None);
        assert_eq!(next_status(Pending, DeclineOffer), None);
        // Admin cannot approve mid-negotiation.
        assert_eq!(next_status(Negotiating, Approve), None);
        // Only one counter-offer round.
        assert_eq!(next_status(Negotiating, ProposeRate), None);
        assert_eq!(next_status(NegotiationAccepted, ProposeRate), None);
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        for status in [Approved, Rejected] {
            for action in [ProposeRate, AcceptOffer, DeclineOffer, Approve, Reject] {
                assert_eq!(next_status(status, action), None);
            }
        }
    }

    #[test]
    fn test_payout_amount_tracks_negotiation_outcome() {
        let mut submission = GiftCardSubmission {
            id: Uuid::nil(),
            user_id: 1,
            brand: "amazon".to_string(),
            currency: "USD".to_string(),
            face_value: dec!(100),
            image_urls: vec!["https://cdn.example.com/card.jpg".to_string()],
            rate: dec!(1120),
            expected_payout: dec!(112000),
            proposed_rate: Some(dec!(1050)),
            proposed_payout: Some(dec!(105000)),
            admin_note: None,
            decline_reason: None,
            reject_reason: None,
            status: SubmissionStatus::NegotiationAccepted,
            payout_transaction_id: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(submission.payout_amount(), dec!(105000));

        // Declined counter falls back to the original quote.
        submission.status = SubmissionStatus::NegotiationRejected;
        assert_eq!(submission.payout_amount(), dec!(112000));

        submission.status = SubmissionStatus::Pending;
        assert_eq!(submission.payout_amount(), dec!(112000));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&NegotiationAccepted).unwrap(),
            "\"negotiation_accepted\""
        );
        assert_eq!(
            serde_json::to_string(&NegotiationRejected).unwrap(),
            "\"negotiation_rejected\""
        );
        assert_eq!(serde_json::to_string(&Pending).unwrap(), "\"pending\"");
    }
}
