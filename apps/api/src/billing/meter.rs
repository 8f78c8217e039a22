//! Tokenomics meter: charges a fixed token cost before a metered operation runs.

use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{AppError, AuthError, PaymentError};
use crate::store::{DebitOutcome, Store};

/// Token cost of ranking candidates against a job persona.
pub const NEURAL_MATCH_COST: u32 = 20;

/// A successful charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charge {
    pub cost: i64,
    pub remaining: i64,
}

impl Charge {
    /// True when this charge moved the balance from at/above `threshold` to below it.
    pub fn crossed_below(&self, threshold: i64) -> bool {
        self.remaining < threshold && self.remaining + self.cost >= threshold
    }
}

/// Debits `cost` tokens from the account against a fresh balance read.
///
/// The check and the decrement are one conditional update in the store, so
/// concurrent charges against the same account can never overdraw it. The
/// TOKEN_DEDUCTION audit entry commits with the debit or not at all.
pub async fn charge(store: &dyn Store, account_id: Uuid, cost: u32) -> Result<Charge, AppError> {
    let cost = i64::from(cost);
    match store.debit_tokens(account_id, cost).await? {
        DebitOutcome::Debited { remaining } => {
            debug!("Charged {cost} tokens to {account_id}, {remaining} left");
            Ok(Charge { cost, remaining })
        }
        DebitOutcome::Insufficient { current } => {
            info!("Rejected metered call for {account_id}: needs {cost}, has {current}");
            Err(PaymentError::InsufficientTokens {
                required: cost,
                current,
            }
            .into())
        }
        DebitOutcome::AccountMissing => Err(AuthError::NotFound.into()),
    }
}
