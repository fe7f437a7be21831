pub mod admin;
pub mod betting;
pub mod cash;
pub mod crypto;
pub mod giftcards;
pub mod rates;
pub mod users;
pub mod vtu;
pub mod wallet;

use rust_decimal::Decimal;
use uuid::Uuid;

use pricing::types::TransactionStatus;

use crate::error::{ApiError, ApiResult};
use crate::models::{SettleOutcome, Transaction};
use crate::upstream::UpstreamReceipt;
use crate::websocket::send_ledger_notifications;
use crate::AppState;

/// Reject the order early when our aggregator float cannot cover it.
pub(crate) async fn ensure_float(state: &AppState, needed: Decimal) -> ApiResult<()> {
    let float = state.upstream.balance().await?;
    if float < needed {
        tracing::error!("aggregator float {} below required {}", float, needed);
        return Err(ApiError::Upstream(
            "provider cannot cover this order right now".to_string(),
        ));
    }
    Ok(())
}

/// Settle a debited purchase from the provider outcome. Success marks the
/// transaction delivered; failure marks it failed, which refunds the debit.
/// Either way the user is notified, then provider errors propagate.
pub(crate) async fn settle_after_upstream(
    state: &AppState,
    user_id: u64,
    transaction_id: Uuid,
    result: Result<UpstreamReceipt, ApiError>,
) -> ApiResult<(Transaction, UpstreamReceipt)> {
    match result {
        Ok(provider_receipt) => {
            let settled = state.storage.settle_transaction(
                user_id,
                transaction_id,
                SettleOutcome {
                    status: TransactionStatus::Success,
                    message: format!("provider status: {}", provider_receipt.status),
                    upstream_order_id: Some(provider_receipt.order_id.clone()),
                },
            )?;
            send_ledger_notifications(&state.notification_manager, &settled);
            Ok((settled.transaction, provider_receipt))
        }
        Err(err) => {
            match state.storage.settle_transaction(
                user_id,
                transaction_id,
                SettleOutcome {
                    status: TransactionStatus::Failed,
                    message: err.to_string(),
                    upstream_order_id: None,
                },
            ) {
                Ok(settled) => send_ledger_notifications(&state.notification_manager, &settled),
                Err(settle_err) => {
                    tracing::error!(
                        "failed to settle transaction {}: {}",
                        transaction_id,
                        settle_err
                    );
                }
            }
            Err(err)
        }
    }
}
