//! Payment settlement: books confirmed funds as tokens.

use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::errors::{AppError, PaymentError};
use crate::models::ledger::Gateway;
use crate::store::{NewSettlement, SettlementReceipt, Store};

/// Minor units per whole currency unit.
const MINOR_PER_UNIT: i64 = 100;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Upper-cases a three-letter ISO 4217 code. Anything else is rejected so
/// revenue never splits across spellings of one currency.
pub fn normalize_currency(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(AppError::Validation(format!(
            "currency must be a three-letter code, got {raw:?}"
        )));
    }
    Ok(code)
}

/// Tokens bought by `amount_minor` at `tokens_per_unit`, rounded down.
pub fn tokens_for(amount_minor: i64, tokens_per_unit: u32) -> i64 {
    amount_minor.saturating_mul(i64::from(tokens_per_unit)) / MINOR_PER_UNIT
}

/// Credits the account for a payment the gateway has confirmed.
///
/// The SUCCESS ledger row, the balance credit and the PAYMENT_RECEIVED audit
/// entry commit together. On any fault nothing of the three is visible; a
/// FAILED ledger row is then written best-effort to record the attempt.
///
/// A `payment_ref` the gateway already settled is acknowledged with the
/// original receipt and credits nothing.
pub async fn settle_payment(
    store: &dyn Store,
    account_id: Uuid,
    payment_ref: &str,
    amount_minor: i64,
    currency: &str,
    gateway: Gateway,
    tokens_per_unit: u32,
) -> Result<SettlementReceipt, AppError> {
    if amount_minor <= 0 {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    let payment_ref = payment_ref.trim();
    if payment_ref.is_empty() {
        return Err(AppError::Validation("payment_ref is required".to_string()));
    }
    let currency = normalize_currency(currency)?;
    let tokens_added = tokens_for(amount_minor, tokens_per_unit);
    if tokens_added <= 0 {
        return Err(AppError::Validation(format!(
            "amount {amount_minor} is too small to buy a token"
        )));
    }

    let settlement = NewSettlement {
        account_id,
        payment_ref: payment_ref.to_string(),
        tokens_added,
        amount_minor,
        currency,
        token_rate: tokens_per_unit,
        gateway,
    };

    match store.settle_payment(&settlement).await {
        Ok(receipt) if receipt.replayed => {
            if receipt.account_id != account_id {
                warn!(
                    "{:?} payment {payment_ref} was booked for {}, not {account_id}",
                    gateway, receipt.account_id
                );
                return Err(AppError::Conflict(format!(
                    "payment {payment_ref} is already settled for another account"
                )));
            }
            info!(
                "{:?} payment {payment_ref} already settled as {}, acknowledging",
                gateway, receipt.transaction_id
            );
            Ok(receipt)
        }
        Ok(receipt) => {
            info!(
                "Settled {:?} payment {} for {account_id}: +{tokens_added} tokens",
                gateway, receipt.transaction_id
            );
            Ok(receipt)
        }
        Err(fault) => {
            error!("Settlement for {account_id} rolled back: {fault}");
            record_failure(store, &settlement, &fault.to_string()).await;
            Err(PaymentError::ProcessingFailed.into())
        }
    }
}

async fn record_failure(store: &dyn Store, settlement: &NewSettlement, reason: &str) {
    match store.record_failed_payment(settlement, reason).await {
        Ok(transaction_id) => {
            audit::record(
                store,
                Some(settlement.account_id),
                AuditAction::PaymentFailed,
                json!({
                    "transaction_id": transaction_id,
                    "amount_minor": settlement.amount_minor,
                }),
            )
            .await;
        }
        Err(e) => warn!(
            "Could not record failed payment for {}: {e}",
            settlement.account_id
        ),
    }
}
