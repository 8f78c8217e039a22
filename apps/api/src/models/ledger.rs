use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ledger entry status. PENDING -> SUCCESS or PENDING -> FAILED, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    Pending,
}

/// Payment gateway that confirmed the funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_gateway")]
pub enum Gateway {
    EcoCash,
    Paynow,
    Stripe,
}

/// One row of the settlement ledger. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Gateway reference for the payment.
    pub payment_ref: String,
    pub tokens_added: i64,
    /// Amount in minor currency units (cents).
    pub amount_minor: i64,
    pub currency: String,
    /// Tokens per whole currency unit at the time of settlement.
    pub token_rate: i32,
    pub gateway: Gateway,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
