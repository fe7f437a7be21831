//! In-memory storage with an atomic wallet ledger.
//!
//! Everything lives behind one mutex so a wallet mutation and the matching
//! transaction record always commit together. There is no code path that
//! changes a balance without writing a transaction, and no path that can
//! observe one half of that pair.
//!
//! Purchases are reference-keyed: replaying a request with the same
//! reference returns the original transaction instead of debiting twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use pricing::types::{ServiceKind, TransactionStatus};

use super::giftcard::{next_status, GiftCardSubmission, NegotiationAction, SubmissionStatus};
use super::transaction::{Direction, Transaction};
use super::user::{default_wallet, KycStatus, User};

pub fn get_current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("user not found")]
    UserNotFound,
    #[error("insufficient wallet balance: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
    #[error("reference '{0}' was already used for a different transaction")]
    ReferenceConflict(String),
    #[error("transaction not found")]
    TransactionNotFound,
    #[error("transaction already settled as {0:?}")]
    AlreadySettled(TransactionStatus),
    #[error("settlement status must be success or failed")]
    NonTerminalSettle,
    #[error("submission not found")]
    SubmissionNotFound,
    #[error("illegal gift card transition from {0:?}")]
    InvalidTransition(SubmissionStatus),
    #[error("submission belongs to another user")]
    NotOwner,
}

/// Outcome of a ledger write: the record plus the balance it left behind.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    pub transaction: Transaction,
    pub balance: Decimal,
    /// True when an existing transaction was returned for a replayed reference.
    pub replayed: bool,
}

/// Terminal outcome applied to a pending transaction.
#[derive(Debug, Clone)]
pub struct SettleOutcome {
    pub status: TransactionStatus,
    pub message: String,
    pub upstream_order_id: Option<String>,
}

// Simple in-memory storage implementation
#[derive(Clone)]
pub struct InMemoryStorage {
    inner: Arc<Mutex<StorageInner>>,
}

#[derive(Default)]
struct StorageInner {
    accounts: HashMap<u64, User>,
    /// session_id -> user_id
    sessions: HashMap<String, u64>,
    /// lowercased email -> user_id
    emails: HashMap<String, u64>,
    /// user_id -> transactions, oldest first
    transactions: HashMap<u64, Vec<Transaction>>,
    /// (user_id, reference) -> transaction id, for idempotent replays
    references: HashMap<(u64, String), Uuid>,
    submissions: HashMap<Uuid, GiftCardSubmission>,
    next_user_id: u64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StorageInner::default())),
        }
    }

    // Get or create a user account with a specific session_id
    pub fn get_or_create_account_with_session(
        &self,
        email: &str,
        session_id: &str,
        is_admin: bool,
    ) -> User {
        let mut inner = self.inner.lock().unwrap();
        let email_key = email.to_ascii_lowercase();

        if let Some(&user_id) = inner.emails.get(&email_key) {
            // Existing account: rotate the session and refresh the admin flag.
            let old_session = inner.accounts[&user_id].session_id.clone();
            inner.sessions.remove(&old_session);
            inner.sessions.insert(session_id.to_string(), user_id);
            let user = inner.accounts.get_mut(&user_id).unwrap();
            user.session_id = session_id.to_string();
            user.is_admin = is_admin;
            return user.clone();
        }

        // Create new account with the default wallet balance
        inner.next_user_id += 1;
        let user_id = inner.next_user_id;
        let new_user = User {
            user_id,
            session_id: session_id.to_string(),
            email: email.to_string(),
            wallet: default_wallet(),
            email_verified: false,
            kyc_status: KycStatus::Unverified,
            is_admin,
            created_at: get_current_timestamp(),
        };

        inner.emails.insert(email_key, user_id);
        inner.sessions.insert(session_id.to_string(), user_id);
        inner.accounts.insert(user_id, new_user.clone());
        new_user
    }

    // Get user by session ID
    pub fn get_user_by_session_id(&self, session_id: &str) -> Option<User> {
        let inner = self.inner.lock().unwrap();
        let user_id = inner.sessions.get(session_id)?;
        inner.accounts.get(user_id).cloned()
    }

    pub fn get_user(&self, user_id: u64) -> Option<User> {
        let inner = self.inner.lock().unwrap();
        inner.accounts.get(&user_id).cloned()
    }

    /// Transactions for a user, newest first.
    pub fn list_transactions(&self, user_id: u64) -> Vec<Transaction> {
        let inner = self.inner.lock().unwrap();
        let mut transactions = inner
            .transactions
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        transactions.reverse();
        transactions
    }

    pub fn get_transaction(&self, user_id: u64, transaction_id: Uuid) -> Option<Transaction> {
        let inner = self.inner.lock().unwrap();
        inner
            .transactions
            .get(&user_id)?
            .iter()
            .find(|tx| tx.id == transaction_id)
            .cloned()
    }

    /// Debit the wallet and record a pending transaction in one step.
    ///
    /// The debit happens before any provider call; a failed provider call is
    /// settled as `failed`, which refunds the hold.
    pub fn debit_for_purchase(
        &self,
        user_id: u64,
        reference: &str,
        service: ServiceKind,
        amount: Decimal,
        metadata: Value,
        message: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) =
            replay_reference(&inner, user_id, reference, service, Direction::Debit, amount)?
        {
            let balance = inner.accounts[&user_id].wallet;
            return Ok(LedgerReceipt {
                transaction: existing,
                balance,
                replayed: true,
            });
        }

        let user = inner
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::UserNotFound)?;
        if user.wallet < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: user.wallet,
            });
        }
        user.wallet -= amount;
        let balance = user.wallet;

        let transaction = insert_transaction(
            &mut inner,
            user_id,
            TransactionDraft {
                reference,
                service,
                direction: Direction::Debit,
                amount,
                status: TransactionStatus::Pending,
                metadata,
                message,
            },
        );

        Ok(LedgerReceipt {
            transaction,
            balance,
            replayed: false,
        })
    }

    /// Record a credit. `TransactionStatus::Success` pays the wallet now;
    /// `Pending` records the claim and pays on settlement.
    pub fn credit(
        &self,
        user_id: u64,
        reference: &str,
        service: ServiceKind,
        amount: Decimal,
        metadata: Value,
        status: TransactionStatus,
        message: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) =
            replay_reference(&inner, user_id, reference, service, Direction::Credit, amount)?
        {
            let balance = inner.accounts[&user_id].wallet;
            return Ok(LedgerReceipt {
                transaction: existing,
                balance,
                replayed: true,
            });
        }

        let user = inner
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::UserNotFound)?;
        if status == TransactionStatus::Success {
            user.wallet += amount;
        }
        let balance = user.wallet;

        let transaction = insert_transaction(
            &mut inner,
            user_id,
            TransactionDraft {
                reference,
                service,
                direction: Direction::Credit,
                amount,
                status,
                metadata,
                message,
            },
        );

        Ok(LedgerReceipt {
            transaction,
            balance,
            replayed: false,
        })
    }

    /// Move a pending transaction to a terminal status and apply the wallet
    /// effect: a failed debit refunds the hold, a successful credit pays out.
    pub fn settle_transaction(
        &self,
        user_id: u64,
        transaction_id: Uuid,
        outcome: SettleOutcome,
    ) -> Result<LedgerReceipt, LedgerError> {
        if !outcome.status.is_terminal() {
            return Err(LedgerError::NonTerminalSettle);
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.accounts.contains_key(&user_id) {
            return Err(LedgerError::UserNotFound);
        }

        let transaction = inner
            .transactions
            .get_mut(&user_id)
            .and_then(|txs| txs.iter_mut().find(|tx| tx.id == transaction_id))
            .ok_or(LedgerError::TransactionNotFound)?;
        if transaction.status.is_terminal() {
            return Err(LedgerError::AlreadySettled(transaction.status));
        }

        transaction.status = outcome.status;
        transaction.message = outcome.message;
        if outcome.upstream_order_id.is_some() {
            transaction.upstream_order_id = outcome.upstream_order_id;
        }
        transaction.updated_at = get_current_timestamp();

        let direction = transaction.direction;
        let amount = transaction.amount;
        let settled = transaction.clone();

        let user = inner.accounts.get_mut(&user_id).unwrap();
        match (outcome.status, direction) {
            (TransactionStatus::Failed, Direction::Debit) => user.wallet += amount,
            (TransactionStatus::Success, Direction::Credit) => user.wallet += amount,
            _ => {}
        }
        let balance = user.wallet;

        Ok(LedgerReceipt {
            transaction: settled,
            balance,
            replayed: false,
        })
    }

    pub fn update_verification(
        &self,
        user_id: u64,
        email_verified: Option<bool>,
        kyc_status: Option<KycStatus>,
    ) -> Result<User, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::UserNotFound)?;
        if let Some(verified) = email_verified {
            user.email_verified = verified;
        }
        if let Some(status) = kyc_status {
            user.kyc_status = status;
        }
        Ok(user.clone())
    }

    pub fn insert_submission(&self, submission: GiftCardSubmission) {
        let mut inner = self.inner.lock().unwrap();
        inner.submissions.insert(submission.id, submission);
    }

    pub fn get_submission(&self, submission_id: Uuid) -> Option<GiftCardSubmission> {
        let inner = self.inner.lock().unwrap();
        inner.submissions.get(&submission_id).cloned()
    }

    /// A user's submissions, newest first.
    pub fn submissions_for_user(&self, user_id: u64) -> Vec<GiftCardSubmission> {
        let inner = self.inner.lock().unwrap();
        let mut submissions: Vec<_> = inner
            .submissions
            .values()
            .filter(|sub| sub.user_id == user_id)
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        submissions
    }

    /// All submissions for the admin queue, optionally filtered by status.
    pub fn submissions_with_status(
        &self,
        status: Option<SubmissionStatus>,
    ) -> Vec<GiftCardSubmission> {
        let inner = self.inner.lock().unwrap();
        let mut submissions: Vec<_> = inner
            .submissions
            .values()
            .filter(|sub| status.is_none_or(|wanted| sub.status == wanted))
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        submissions
    }

    /// Admin counter-offer: pending -> negotiating with the proposed numbers.
    pub fn propose_rate(
        &self,
        submission_id: Uuid,
        proposed_rate: Decimal,
        note: Option<String>,
    ) -> Result<GiftCardSubmission, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let submission = inner
            .submissions
            .get_mut(&submission_id)
            .ok_or(LedgerError::SubmissionNotFound)?;
        let status = next_status(submission.status, NegotiationAction::ProposeRate)
            .ok_or(LedgerError::InvalidTransition(submission.status))?;

        submission.status = status;
        submission.proposed_rate = Some(proposed_rate);
        submission.proposed_payout = Some((submission.face_value * proposed_rate).round_dp(2));
        submission.admin_note = note;
        submission.updated_at = get_current_timestamp();
        Ok(submission.clone())
    }

    /// User accepts the counter-offer on their own submission.
    pub fn accept_offer(
        &self,
        submission_id: Uuid,
        user_id: u64,
    ) -> Result<GiftCardSubmission, LedgerError> {
        self.respond_to_offer(submission_id, user_id, NegotiationAction::AcceptOffer, None)
    }

    /// User declines the counter-offer on their own submission.
    pub fn decline_offer(
        &self,
        submission_id: Uuid,
        user_id: u64,
        reason: String,
    ) -> Result<GiftCardSubmission, LedgerError> {
        self.respond_to_offer(
            submission_id,
            user_id,
            NegotiationAction::DeclineOffer,
            Some(reason),
        )
    }

    fn respond_to_offer(
        &self,
        submission_id: Uuid,
        user_id: u64,
        action: NegotiationAction,
        reason: Option<String>,
    ) -> Result<GiftCardSubmission, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let submission = inner
            .submissions
            .get_mut(&submission_id)
            .ok_or(LedgerError::SubmissionNotFound)?;
        if submission.user_id != user_id {
            return Err(LedgerError::NotOwner);
        }
        let status = next_status(submission.status, action)
            .ok_or(LedgerError::InvalidTransition(submission.status))?;

        submission.status = status;
        if reason.is_some() {
            submission.decline_reason = reason;
        }
        submission.updated_at = get_current_timestamp();
        Ok(submission.clone())
    }

    /// Approve a submission and credit the payout in the same critical
    /// section, so the approval and the wallet credit cannot diverge.
    pub fn approve_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<(GiftCardSubmission, LedgerReceipt), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let submission = inner
            .submissions
            .get(&submission_id)
            .ok_or(LedgerError::SubmissionNotFound)?;
        let status = next_status(submission.status, NegotiationAction::Approve)
            .ok_or(LedgerError::InvalidTransition(submission.status))?;

        // Payout depends on the status before the transition.
        let payout = submission.payout_amount();
        let user_id = submission.user_id;
        let brand = submission.brand.clone();
        let face_value = submission.face_value;
        let reference = format!("giftcard-{submission_id}");
        let metadata = serde_json::json!({
            "submission_id": submission_id,
            "brand": brand,
            "face_value": face_value,
        });

        let user = inner
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::UserNotFound)?;
        user.wallet += payout;
        let balance = user.wallet;

        let transaction = insert_transaction(
            &mut inner,
            user_id,
            TransactionDraft {
                reference: &reference,
                service: ServiceKind::GiftCard,
                direction: Direction::Credit,
                amount: payout,
                status: TransactionStatus::Success,
                metadata,
                message: "gift card approved",
            },
        );

        let submission = inner.submissions.get_mut(&submission_id).unwrap();
        submission.status = status;
        submission.payout_transaction_id = Some(transaction.id);
        submission.updated_at = get_current_timestamp();
        let submission = submission.clone();

        Ok((
            submission,
            LedgerReceipt {
                transaction,
                balance,
                replayed: false,
            },
        ))
    }

    pub fn reject_submission(
        &self,
        submission_id: Uuid,
        reason: String,
    ) -> Result<GiftCardSubmission, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let submission = inner
            .submissions
            .get_mut(&submission_id)
            .ok_or(LedgerError::SubmissionNotFound)?;
        let status = next_status(submission.status, NegotiationAction::Reject)
            .ok_or(LedgerError::InvalidTransition(submission.status))?;

        submission.status = status;
        submission.reject_reason = Some(reason);
        submission.updated_at = get_current_timestamp();
        Ok(submission.clone())
    }
}

/// Look up a reference for the user. A hit with matching parameters is a
/// replay; a hit with different parameters is a conflict.
fn replay_reference(
    inner: &StorageInner,
    user_id: u64,
    reference: &str,
    service: ServiceKind,
    direction: Direction,
    amount: Decimal,
) -> Result<Option<Transaction>, LedgerError> {
    let key = (user_id, reference.to_string());
    let Some(&transaction_id) = inner.references.get(&key) else {
        return Ok(None);
    };
    let existing = inner
        .transactions
        .get(&user_id)
        .and_then(|txs| txs.iter().find(|tx| tx.id == transaction_id))
        .ok_or(LedgerError::TransactionNotFound)?;
    if existing.service == service && existing.direction == direction && existing.amount == amount {
        Ok(Some(existing.clone()))
    } else {
        Err(LedgerError::ReferenceConflict(reference.to_string()))
    }
}

/// Row fields for a new transaction; id and timestamps are assigned on insert.
struct TransactionDraft<'a> {
    reference: &'a str,
    service: ServiceKind,
    direction: Direction,
    amount: Decimal,
    status: TransactionStatus,
    metadata: Value,
    message: &'a str,
}

fn insert_transaction(
    inner: &mut StorageInner,
    user_id: u64,
    draft: TransactionDraft<'_>,
) -> Transaction {
    let now = get_current_timestamp();
    let transaction = Transaction {
        id: Uuid::new_v4(),
        reference: draft.reference.to_string(),
        user_id,
        service: draft.service,
        direction: draft.direction,
        amount: draft.amount,
        status: draft.status,
        metadata: draft.metadata,
        upstream_order_id: None,
        message: draft.message.to_string(),
        created_at: now,
        updated_at: now,
    };
    inner
        .references
        .insert((user_id, draft.reference.to_string()), transaction.id);
    inner
        .transactions
        .entry(user_id)
        .or_default()
        .push(transaction.clone());
    transaction
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn setup_storage() -> InMemoryStorage {
        InMemoryStorage::new()
    }

    fn setup_user(storage: &InMemoryStorage, email: &str) -> User {
        storage.get_or_create_account_with_session(email, &format!("session-{email}"), false)
    }

    fn setup_submission(storage: &InMemoryStorage, user_id: u64) -> GiftCardSubmission {
        let submission = GiftCardSubmission {
            id: Uuid::new_v4(),
            user_id,
            brand: "amazon".to_string(),
            currency: "USD".to_string(),
            face_value: dec!(150),
            image_urls: vec!["https://cdn.example.com/front.jpg".to_string()],
            rate: dec!(1120),
            expected_payout: dec!(168000),
            proposed_rate: None,
            proposed_payout: None,
            admin_note: None,
            decline_reason: None,
            reject_reason: None,
            status: SubmissionStatus::Pending,
            payout_transaction_id: None,
            created_at: get_current_timestamp(),
            updated_at: get_current_timestamp(),
        };
        storage.insert_submission(submission.clone());
        submission
    }

    #[test]
    fn test_new_accounts_seed_demo_wallet() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        assert_eq!(user.wallet, dec!(50000));
        assert_eq!(user.user_id, 1);
        assert!(!user.is_admin);

        let second = setup_user(&storage, "bob@example.com");
        assert_eq!(second.user_id, 2);
    }

    #[test]
    fn test_relogin_keeps_account_and_rotates_session() {
        let storage = setup_storage();
        let user = storage.get_or_create_account_with_session("alice@example.com", "s1", false);
        storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();

        let again = storage.get_or_create_account_with_session("alice@example.com", "s2", false);
        assert_eq!(again.user_id, user.user_id);
        assert_eq!(again.wallet, dec!(49000));
        assert!(storage.get_user_by_session_id("s1").is_none());
        assert!(storage.get_user_by_session_id("s2").is_some());
    }

    #[test]
    fn test_debit_reduces_balance_and_records_pending() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({ "network": "mtn" }),
                "airtime purchase",
            )
            .unwrap();

        assert_eq!(receipt.balance, dec!(49000));
        assert!(!receipt.replayed);
        assert_eq!(receipt.transaction.status, TransactionStatus::Pending);
        assert_eq!(receipt.transaction.direction, Direction::Debit);

        let history = storage.list_transactions(user.user_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reference, "ref-1");
    }

    #[test]
    fn test_recorded_transaction_carries_request_fields() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .debit_for_purchase(
                user.user_id,
                "ref-fields",
                ServiceKind::Data,
                dec!(279.72),
                json!({ "plan": "mtn-1gb-30" }),
                "data purchase",
            )
            .unwrap();

        let stored = storage
            .get_transaction(user.user_id, receipt.transaction.id)
            .unwrap();
        assert_eq!(stored.reference, "ref-fields");
        assert_eq!(stored.service, ServiceKind::Data);
        assert_eq!(stored.direction, Direction::Debit);
        assert_eq!(stored.amount, dec!(279.72));
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(stored.metadata, json!({ "plan": "mtn-1gb-30" }));
        assert_eq!(stored.message, "data purchase");
        assert!(stored.upstream_order_id.is_none());
    }

    #[test]
    fn test_debit_insufficient_balance_leaves_no_trace() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let err = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(100000),
                json!({}),
                "too much",
            )
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                required: dec!(100000),
                available: dec!(50000),
            }
        );

        assert_eq!(storage.get_user(user.user_id).unwrap().wallet, dec!(50000));
        assert!(storage.list_transactions(user.user_id).is_empty());
    }

    #[test]
    fn test_debit_replay_same_reference_is_idempotent() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let first = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();
        let replay = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();

        assert!(replay.replayed);
        assert_eq!(replay.transaction.id, first.transaction.id);
        // Only one debit applied.
        assert_eq!(replay.balance, dec!(49000));
        assert_eq!(storage.list_transactions(user.user_id).len(), 1);
    }

    #[test]
    fn test_reference_conflict_on_mismatched_params() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();
        let err = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(2000),
                json!({}),
                "airtime",
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::ReferenceConflict("ref-1".to_string()));
    }

    #[test]
    fn test_references_are_scoped_per_user() {
        let storage = setup_storage();
        let alice = setup_user(&storage, "alice@example.com");
        let bob = setup_user(&storage, "bob@example.com");

        storage
            .debit_for_purchase(
                alice.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();
        let receipt = storage
            .debit_for_purchase(
                bob.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();
        assert!(!receipt.replayed);
    }

    #[test]
    fn test_settle_failed_debit_refunds_wallet() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Data,
                dec!(279.72),
                json!({}),
                "data plan",
            )
            .unwrap();
        assert_eq!(receipt.balance, dec!(49720.28));

        let settled = storage
            .settle_transaction(
                user.user_id,
                receipt.transaction.id,
                SettleOutcome {
                    status: TransactionStatus::Failed,
                    message: "provider rejected".to_string(),
                    upstream_order_id: None,
                },
            )
            .unwrap();

        assert_eq!(settled.transaction.status, TransactionStatus::Failed);
        assert_eq!(settled.balance, dec!(50000));
    }

    #[test]
    fn test_settle_success_debit_keeps_funds_spent() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();
        let settled = storage
            .settle_transaction(
                user.user_id,
                receipt.transaction.id,
                SettleOutcome {
                    status: TransactionStatus::Success,
                    message: "delivered".to_string(),
                    upstream_order_id: Some("ORD-123".to_string()),
                },
            )
            .unwrap();

        assert_eq!(settled.balance, dec!(49000));
        assert_eq!(
            settled.transaction.upstream_order_id,
            Some("ORD-123".to_string())
        );
    }

    #[test]
    fn test_settle_success_credit_realizes_funds() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        // Pending credit holds no funds until settled.
        let receipt = storage
            .credit(
                user.user_id,
                "cash-1",
                ServiceKind::AirtimeCash,
                dec!(700),
                json!({ "network": "mtn" }),
                TransactionStatus::Pending,
                "awaiting airtime confirmation",
            )
            .unwrap();
        assert_eq!(receipt.balance, dec!(50000));

        let settled = storage
            .settle_transaction(
                user.user_id,
                receipt.transaction.id,
                SettleOutcome {
                    status: TransactionStatus::Success,
                    message: "airtime received".to_string(),
                    upstream_order_id: None,
                },
            )
            .unwrap();
        assert_eq!(settled.balance, dec!(50700));
    }

    #[test]
    fn test_settle_failed_credit_pays_nothing() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .credit(
                user.user_id,
                "cash-1",
                ServiceKind::AirtimeCash,
                dec!(700),
                json!({}),
                TransactionStatus::Pending,
                "awaiting airtime confirmation",
            )
            .unwrap();
        let settled = storage
            .settle_transaction(
                user.user_id,
                receipt.transaction.id,
                SettleOutcome {
                    status: TransactionStatus::Failed,
                    message: "airtime never arrived".to_string(),
                    upstream_order_id: None,
                },
            )
            .unwrap();
        assert_eq!(settled.balance, dec!(50000));
    }

    #[test]
    fn test_settle_twice_rejected() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();
        let outcome = SettleOutcome {
            status: TransactionStatus::Failed,
            message: "provider down".to_string(),
            upstream_order_id: None,
        };
        storage
            .settle_transaction(user.user_id, receipt.transaction.id, outcome.clone())
            .unwrap();

        // A second settlement must not refund twice.
        let err = storage
            .settle_transaction(user.user_id, receipt.transaction.id, outcome)
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadySettled(TransactionStatus::Failed));
        assert_eq!(storage.get_user(user.user_id).unwrap().wallet, dec!(50000));
    }

    #[test]
    fn test_settle_requires_terminal_status() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let receipt = storage
            .debit_for_purchase(
                user.user_id,
                "ref-1",
                ServiceKind::Airtime,
                dec!(1000),
                json!({}),
                "airtime",
            )
            .unwrap();

        let err = storage
            .settle_transaction(
                user.user_id,
                receipt.transaction.id,
                SettleOutcome {
                    status: TransactionStatus::Pending,
                    message: "still waiting".to_string(),
                    upstream_order_id: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::NonTerminalSettle);
    }

    #[test]
    fn test_immediate_credit_pays_wallet() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let receipt = storage
            .credit(
                user.user_id,
                "deposit-1",
                ServiceKind::Deposit,
                dec!(25000),
                json!({ "channel": "bank_transfer" }),
                TransactionStatus::Success,
                "wallet funded",
            )
            .unwrap();
        assert_eq!(receipt.balance, dec!(75000));

        // Replay does not double-pay.
        let replay = storage
            .credit(
                user.user_id,
                "deposit-1",
                ServiceKind::Deposit,
                dec!(25000),
                json!({ "channel": "bank_transfer" }),
                TransactionStatus::Success,
                "wallet funded",
            )
            .unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.balance, dec!(75000));
    }

    #[test]
    fn test_negotiation_accept_pays_proposed_amount() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let submission = setup_submission(&storage, user.user_id);

        storage
            .propose_rate(submission.id, dec!(1100), Some("rate dropped".to_string()))
            .unwrap();
        let accepted = storage.accept_offer(submission.id, user.user_id).unwrap();
        assert_eq!(accepted.status, SubmissionStatus::NegotiationAccepted);
        assert_eq!(accepted.proposed_payout, Some(dec!(165000)));

        let (approved, receipt) = storage.approve_submission(submission.id).unwrap();
        assert_eq!(approved.status, SubmissionStatus::Approved);
        assert_eq!(receipt.transaction.amount, dec!(165000));
        assert_eq!(receipt.balance, dec!(215000));
        assert_eq!(approved.payout_transaction_id, Some(receipt.transaction.id));
    }

    #[test]
    fn test_decline_then_approve_pays_original_quote() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let submission = setup_submission(&storage, user.user_id);

        storage.propose_rate(submission.id, dec!(1100), None).unwrap();
        let declined = storage
            .decline_offer(submission.id, user.user_id, "rate too low".to_string())
            .unwrap();
        assert_eq!(declined.status, SubmissionStatus::NegotiationRejected);
        assert_eq!(declined.decline_reason, Some("rate too low".to_string()));

        let (_, receipt) = storage.approve_submission(submission.id).unwrap();
        assert_eq!(receipt.transaction.amount, dec!(168000));
    }

    #[test]
    fn test_direct_approve_pays_original_quote() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let submission = setup_submission(&storage, user.user_id);

        let (approved, receipt) = storage.approve_submission(submission.id).unwrap();
        assert_eq!(approved.status, SubmissionStatus::Approved);
        assert_eq!(receipt.transaction.amount, dec!(168000));
        assert_eq!(receipt.transaction.service, ServiceKind::GiftCard);
    }

    #[test]
    fn test_double_approve_blocked() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let submission = setup_submission(&storage, user.user_id);

        storage.approve_submission(submission.id).unwrap();
        let err = storage.approve_submission(submission.id).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition(SubmissionStatus::Approved)
        );
        // Paid exactly once.
        assert_eq!(storage.get_user(user.user_id).unwrap().wallet, dec!(218000));
    }

    #[test]
    fn test_accept_requires_counter_offer() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let submission = setup_submission(&storage, user.user_id);

        let err = storage.accept_offer(submission.id, user.user_id).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition(SubmissionStatus::Pending)
        );
    }

    #[test]
    fn test_offer_response_requires_owner() {
        let storage = setup_storage();
        let alice = setup_user(&storage, "alice@example.com");
        let mallory = setup_user(&storage, "mallory@example.com");
        let submission = setup_submission(&storage, alice.user_id);

        storage.propose_rate(submission.id, dec!(1100), None).unwrap();
        let err = storage
            .accept_offer(submission.id, mallory.user_id)
            .unwrap_err();
        assert_eq!(err, LedgerError::NotOwner);
    }

    #[test]
    fn test_reject_records_reason() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");
        let submission = setup_submission(&storage, user.user_id);

        let rejected = storage
            .reject_submission(submission.id, "card already redeemed".to_string())
            .unwrap();
        assert_eq!(rejected.status, SubmissionStatus::Rejected);
        assert_eq!(
            rejected.reject_reason,
            Some("card already redeemed".to_string())
        );
        // No payout on rejection.
        assert_eq!(storage.get_user(user.user_id).unwrap().wallet, dec!(50000));
    }

    #[test]
    fn test_update_verification() {
        let storage = setup_storage();
        let user = setup_user(&storage, "alice@example.com");

        let updated = storage
            .update_verification(user.user_id, Some(true), Some(KycStatus::Verified))
            .unwrap();
        assert!(updated.email_verified);
        assert_eq!(updated.kyc_status, KycStatus::Verified);

        // Partial update leaves the other flag alone.
        let updated = storage
            .update_verification(user.user_id, None, Some(KycStatus::Pending))
            .unwrap();
        assert!(updated.email_verified);
        assert_eq!(updated.kyc_status, KycStatus::Pending);
    }

    #[test]
    fn test_submission_queries() {
        let storage = setup_storage();
        let alice = setup_user(&storage, "alice@example.com");
        let bob = setup_user(&storage, "bob@example.com");
        let first = setup_submission(&storage, alice.user_id);
        let second = setup_submission(&storage, bob.user_id);

        storage.propose_rate(second.id, dec!(1000), None).unwrap();

        assert_eq!(storage.submissions_for_user(alice.user_id).len(), 1);
        assert_eq!(storage.submissions_with_status(None).len(), 2);
        let negotiating = storage.submissions_with_status(Some(SubmissionStatus::Negotiating));
        assert_eq!(negotiating.len(), 1);
        assert_eq!(negotiating[0].id, second.id);
        assert!(storage.get_submission(first.id).is_some());
    }
}
