mod database;
mod giftcard;
mod transaction;
mod user;

pub use database::{
    get_current_timestamp, InMemoryStorage, LedgerError, LedgerReceipt, SettleOutcome,
};
pub use giftcard::{GiftCardSubmission, SubmissionStatus};
pub use transaction::{Direction, Transaction};
pub use user::{AuthenticatedUser, KycStatus, User};
