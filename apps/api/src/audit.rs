//! Append-only audit log.
//!
//! Outside of the debit and settlement units an audit write is best-effort:
//! a failure is logged and never reaches the caller.

use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::store::{NewAuditEntry, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    TokenDeduction,
    PaymentReceived,
    PaymentFailed,
    UserRegistered,
    UserLogin,
    PasswordReset,
    PasswordChanged,
    BlockUser,
    UnblockUser,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::TokenDeduction => "TOKEN_DEDUCTION",
            AuditAction::PaymentReceived => "PAYMENT_RECEIVED",
            AuditAction::PaymentFailed => "PAYMENT_FAILED",
            AuditAction::UserRegistered => "USER_REGISTERED",
            AuditAction::UserLogin => "USER_LOGIN",
            AuditAction::PasswordReset => "PASSWORD_RESET",
            AuditAction::PasswordChanged => "PASSWORD_CHANGED",
            AuditAction::BlockUser => "BLOCK_USER",
            AuditAction::UnblockUser => "UNBLOCK_USER",
        }
    }
}

/// Payload of a TOKEN_DEDUCTION entry.
pub fn deduction_details(cost: i64, remaining: i64) -> Value {
    json!({ "cost": cost, "remaining": remaining })
}

/// Payload of a PAYMENT_RECEIVED entry.
pub fn payment_details(transaction_id: Uuid, amount_minor: i64, tokens_added: i64) -> Value {
    json!({
        "transaction_id": transaction_id,
        "amount_minor": amount_minor,
        "tokens_added": tokens_added,
    })
}

/// Best-effort append. Never fails the calling operation.
pub async fn record(store: &dyn Store, actor: Option<Uuid>, action: AuditAction, details: Value) {
    let entry = NewAuditEntry {
        account_id: actor,
        action: action.as_str(),
        details,
    };
    if let Err(e) = store.append_audit(entry).await {
        warn!("Audit write for {} dropped: {e}", action.as_str());
    }
}
