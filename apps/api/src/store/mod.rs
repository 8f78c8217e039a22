//! Storage interface for accounts, the settlement ledger and the audit log.
//!
//! Every method is one unit of work against the backing store. `debit_tokens`
//! and `settle_payment` are atomic: their balance change and audit entry are
//! committed together or not at all.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::admin::analytics::PlatformAnalytics;
use crate::errors::StorageFault;
use crate::models::account::{AccountRow, AccountStatus, AccountSummary, Role};
use crate::models::audit::AuditLogRow;
use crate::models::ledger::{Gateway, TransactionRow};

/// Result of a conditional debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { remaining: i64 },
    Insufficient { current: i64 },
    AccountMissing,
}

/// A confirmed payment, ready to be booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSettlement {
    pub account_id: Uuid,
    /// The gateway's own reference for the payment. At most one SUCCESS row
    /// exists per `(gateway, payment_ref)`.
    pub payment_ref: String,
    pub tokens_added: i64,
    pub amount_minor: i64,
    pub currency: String,
    pub token_rate: u32,
    pub gateway: Gateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementReceipt {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub tokens_added: i64,
    pub balance: i64,
    /// True when the payment had already been booked and nothing was written.
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub account_id: Option<Uuid>,
    pub action: &'static str,
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Filter for audit log reads. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub account_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Point lookup of the live account fields. Never cached.
    async fn find_account(&self, id: Uuid) -> Result<Option<AccountStatus>, StorageFault>;

    /// Decrements the balance by `cost` only if it is at least `cost`, and writes
    /// the TOKEN_DEDUCTION audit entry in the same unit.
    async fn debit_tokens(&self, account_id: Uuid, cost: i64) -> Result<DebitOutcome, StorageFault>;

    /// Books a SUCCESS ledger row, credits the balance and writes the
    /// PAYMENT_RECEIVED audit entry in one transaction. A payment reference
    /// that already has a SUCCESS row is not booked again; its existing
    /// receipt comes back with `replayed` set.
    async fn settle_payment(
        &self,
        settlement: &NewSettlement,
    ) -> Result<SettlementReceipt, StorageFault>;

    /// Records a FAILED ledger row for a settlement that was rolled back.
    async fn record_failed_payment(
        &self,
        settlement: &NewSettlement,
        reason: &str,
    ) -> Result<Uuid, StorageFault>;

    /// Appends one audit entry outside of any money-moving unit.
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StorageFault>;

    // Accounts

    /// Fails with `StorageFault::DuplicateEmail` when the email is taken.
    async fn create_account(&self, account: &NewAccount) -> Result<AccountSummary, StorageFault>;

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRow>, StorageFault>;

    async fn find_account_row(&self, id: Uuid) -> Result<Option<AccountRow>, StorageFault>;

    /// Returns false when the account does not exist.
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StorageFault>;

    async fn update_profile_picture(
        &self,
        id: Uuid,
        url: Option<String>,
    ) -> Result<Option<AccountSummary>, StorageFault>;

    async fn update_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> Result<Option<AccountSummary>, StorageFault>;

    /// All accounts, newest first.
    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StorageFault>;

    // Reads for the billing and admin screens

    /// The account's ledger, newest first.
    async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionRow>, StorageFault>;

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogRow>, StorageFault>;

    async fn analytics(&self) -> Result<PlatformAnalytics, StorageFault>;
}
