use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::billing::settlement::tokens_for;

const PAYMENT_TERMS_DAYS: i64 = 7;

/// A top-up quote handed to the payment gateway. Not persisted; the ledger
/// row is written only when the gateway confirms funds.
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub tokens: i64,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

pub fn generate_invoice(
    account_id: Uuid,
    amount_minor: i64,
    currency: &str,
    tokens_per_unit: u32,
    now: DateTime<Utc>,
) -> Invoice {
    Invoice {
        invoice_id: format!("INV-{}", now.timestamp_millis()),
        account_id,
        amount_minor,
        currency: currency.to_string(),
        tokens: tokens_for(amount_minor, tokens_per_unit),
        issued_at: now,
        due_date: now + Duration::days(PAYMENT_TERMS_DAYS),
    }
}
