//! In-memory `Store` for unit tests, with fault injection at the points the
//! atomic units must survive.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::admin::analytics::{CurrencyRevenue, PlatformAnalytics};
use crate::audit::{deduction_details, payment_details, AuditAction};
use crate::auth::password::hash_with_iterations;
use crate::errors::StorageFault;
use crate::models::account::{AccountRow, AccountStatus, AccountSummary, Role};
use crate::models::audit::AuditLogRow;
use crate::models::ledger::{TransactionRow, TransactionStatus};
use crate::store::{
    AuditQuery, DebitOutcome, NewAccount, NewAuditEntry, NewSettlement, SettlementReceipt, Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Account lookups fail.
    Lookup,
    /// Any audit insert fails, including the one inside a debit.
    AuditWrite,
    /// The balance credit inside a settlement fails.
    BalanceCredit,
}

#[derive(Default, Clone)]
struct State {
    accounts: HashMap<Uuid, AccountRow>,
    // Both in insertion order.
    transactions: Vec<TransactionRow>,
    audit: Vec<AuditLogRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account that cannot log in.
    pub fn insert_account(&self, email: &str, role: Role, tokens: i64) -> Uuid {
        self.insert_row(email, String::new(), role, tokens)
    }

    /// Adds an account with a real (cheaply derived) password hash.
    pub fn insert_account_with_password(
        &self,
        email: &str,
        role: Role,
        tokens: i64,
        password: &str,
    ) -> Uuid {
        self.insert_row(email, hash_with_iterations(password, 1_000), role, tokens)
    }

    fn insert_row(&self, email: &str, password_hash: String, role: Role, tokens: i64) -> Uuid {
        let id = Uuid::new_v4();
        let account = AccountRow {
            id,
            email: email.to_string(),
            password_hash,
            role,
            tokens,
            is_blocked: false,
            profile_picture_url: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().accounts.insert(id, account);
        id
    }

    pub fn set_blocked(&self, id: Uuid, blocked: bool) {
        if let Some(account) = self.state.lock().unwrap().accounts.get_mut(&id) {
            account.is_blocked = blocked;
        }
    }

    pub fn balance(&self, id: Uuid) -> Option<i64> {
        self.state.lock().unwrap().accounts.get(&id).map(|a| a.tokens)
    }

    pub fn password_hash(&self, id: Uuid) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(&id)
            .map(|a| a.password_hash.clone())
    }

    pub fn audit_entries(&self) -> Vec<AuditLogRow> {
        self.state.lock().unwrap().audit.clone()
    }

    pub fn transactions(&self) -> Vec<TransactionRow> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn inject_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    pub fn clear_fault(&self) {
        *self.fault.lock().unwrap() = None;
    }

    fn fails_at(&self, fault: Fault) -> bool {
        *self.fault.lock().unwrap() == Some(fault)
    }
}

fn status_of(row: &AccountRow) -> AccountStatus {
    AccountStatus {
        id: row.id,
        email: row.email.clone(),
        role: row.role,
        tokens: row.tokens,
        is_blocked: row.is_blocked,
    }
}

fn audit_row(account_id: Option<Uuid>, action: &str, details: serde_json::Value) -> AuditLogRow {
    AuditLogRow {
        id: Uuid::new_v4(),
        account_id,
        action: action.to_string(),
        details,
        created_at: Utc::now(),
    }
}

fn ledger_row(
    settlement: &NewSettlement,
    status: TransactionStatus,
    failure_reason: Option<String>,
) -> TransactionRow {
    TransactionRow {
        id: Uuid::new_v4(),
        account_id: settlement.account_id,
        payment_ref: settlement.payment_ref.clone(),
        tokens_added: settlement.tokens_added,
        amount_minor: settlement.amount_minor,
        currency: settlement.currency.clone(),
        token_rate: settlement.token_rate as i32,
        gateway: settlement.gateway,
        status,
        failure_reason,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_account(&self, id: Uuid) -> Result<Option<AccountStatus>, StorageFault> {
        if self.fails_at(Fault::Lookup) {
            return Err(StorageFault::Injected("lookup"));
        }
        Ok(self.state.lock().unwrap().accounts.get(&id).map(status_of))
    }

    async fn debit_tokens(&self, account_id: Uuid, cost: i64) -> Result<DebitOutcome, StorageFault> {
        let audit_fails = self.fails_at(Fault::AuditWrite);
        let mut state = self.state.lock().unwrap();

        // Work on a staged copy so a failure leaves `state` untouched.
        let mut staged = state.clone();
        let Some(account) = staged.accounts.get_mut(&account_id) else {
            return Ok(DebitOutcome::AccountMissing);
        };
        if account.tokens < cost {
            return Ok(DebitOutcome::Insufficient {
                current: account.tokens,
            });
        }
        account.tokens -= cost;
        let remaining = account.tokens;

        if audit_fails {
            return Err(StorageFault::Injected("audit write"));
        }
        staged.audit.push(audit_row(
            Some(account_id),
            AuditAction::TokenDeduction.as_str(),
            deduction_details(cost, remaining),
        ));

        *state = staged;
        Ok(DebitOutcome::Debited { remaining })
    }

    async fn settle_payment(
        &self,
        settlement: &NewSettlement,
    ) -> Result<SettlementReceipt, StorageFault> {
        let credit_fails = self.fails_at(Fault::BalanceCredit);
        let audit_fails = self.fails_at(Fault::AuditWrite);
        let mut state = self.state.lock().unwrap();

        let booked = state.transactions.iter().find(|t| {
            t.status == TransactionStatus::Success
                && t.gateway == settlement.gateway
                && t.payment_ref == settlement.payment_ref
        });
        if let Some(booked) = booked {
            let balance = state
                .accounts
                .get(&booked.account_id)
                .map(|a| a.tokens)
                .ok_or(StorageFault::MissingAccount(booked.account_id))?;
            return Ok(SettlementReceipt {
                transaction_id: booked.id,
                account_id: booked.account_id,
                tokens_added: booked.tokens_added,
                balance,
                replayed: true,
            });
        }

        let mut staged = state.clone();
        let row = ledger_row(settlement, TransactionStatus::Success, None);
        let transaction_id = row.id;
        staged.transactions.push(row);

        if credit_fails {
            return Err(StorageFault::Injected("balance credit"));
        }
        let account = staged
            .accounts
            .get_mut(&settlement.account_id)
            .ok_or(StorageFault::MissingAccount(settlement.account_id))?;
        account.tokens += settlement.tokens_added;
        let balance = account.tokens;

        if audit_fails {
            return Err(StorageFault::Injected("audit write"));
        }
        staged.audit.push(audit_row(
            Some(settlement.account_id),
            AuditAction::PaymentReceived.as_str(),
            payment_details(
                transaction_id,
                settlement.amount_minor,
                settlement.tokens_added,
            ),
        ));

        *state = staged;
        Ok(SettlementReceipt {
            transaction_id,
            account_id: settlement.account_id,
            tokens_added: settlement.tokens_added,
            balance,
            replayed: false,
        })
    }

    async fn record_failed_payment(
        &self,
        settlement: &NewSettlement,
        reason: &str,
    ) -> Result<Uuid, StorageFault> {
        let mut state = self.state.lock().unwrap();
        if !state.accounts.contains_key(&settlement.account_id) {
            return Err(StorageFault::MissingAccount(settlement.account_id));
        }
        let row = ledger_row(settlement, TransactionStatus::Failed, Some(reason.to_string()));
        let id = row.id;
        state.transactions.push(row);
        Ok(id)
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StorageFault> {
        if self.fails_at(Fault::AuditWrite) {
            return Err(StorageFault::Injected("audit write"));
        }
        self.state
            .lock()
            .unwrap()
            .audit
            .push(audit_row(entry.account_id, entry.action, entry.details));
        Ok(())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<AccountSummary, StorageFault> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(StorageFault::DuplicateEmail);
        }
        let row = AccountRow {
            id: Uuid::new_v4(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            role: account.role,
            tokens: 0,
            is_blocked: false,
            profile_picture_url: None,
            created_at: Utc::now(),
        };
        state.accounts.insert(row.id, row.clone());
        Ok(row.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRow>, StorageFault> {
        if self.fails_at(Fault::Lookup) {
            return Err(StorageFault::Injected("lookup"));
        }
        let state = self.state.lock().unwrap();
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_row(&self, id: Uuid) -> Result<Option<AccountRow>, StorageFault> {
        if self.fails_at(Fault::Lookup) {
            return Err(StorageFault::Injected("lookup"));
        }
        Ok(self.state.lock().unwrap().accounts.get(&id).cloned())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StorageFault> {
        let mut state = self.state.lock().unwrap();
        Ok(match state.accounts.get_mut(&id) {
            Some(account) => {
                account.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn update_profile_picture(
        &self,
        id: Uuid,
        url: Option<String>,
    ) -> Result<Option<AccountSummary>, StorageFault> {
        let mut state = self.state.lock().unwrap();
        Ok(state.accounts.get_mut(&id).map(|account| {
            account.profile_picture_url = url;
            account.clone().into()
        }))
    }

    async fn update_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> Result<Option<AccountSummary>, StorageFault> {
        let mut state = self.state.lock().unwrap();
        Ok(state.accounts.get_mut(&id).map(|account| {
            account.is_blocked = blocked;
            account.clone().into()
        }))
    }

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StorageFault> {
        let state = self.state.lock().unwrap();
        let mut accounts: Vec<AccountSummary> =
            state.accounts.values().cloned().map(Into::into).collect();
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(accounts)
    }

    async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionRow>, StorageFault> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.account_id == account_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogRow>, StorageFault> {
        let state = self.state.lock().unwrap();
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|e| query.account_id.map_or(true, |id| e.account_id == Some(id)))
            .filter(|e| query.action.as_deref().map_or(true, |a| e.action == a))
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn analytics(&self) -> Result<PlatformAnalytics, StorageFault> {
        let state = self.state.lock().unwrap();

        let by_role = Role::ALL
            .iter()
            .map(|role| {
                let count = state.accounts.values().filter(|a| a.role == *role).count();
                (*role, count as i64)
            })
            .collect();

        let settled = state
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Success);
        let mut revenue: BTreeMap<String, i64> = BTreeMap::new();
        let mut tokens_sold = 0;
        for t in settled {
            *revenue.entry(t.currency.clone()).or_default() += t.amount_minor;
            tokens_sold += t.tokens_added;
        }

        let tokens_spent = state
            .audit
            .iter()
            .filter(|e| e.action == AuditAction::TokenDeduction.as_str())
            .filter_map(|e| e.details["cost"].as_i64())
            .sum();

        let revenue = revenue
            .into_iter()
            .map(|(currency, amount_minor)| CurrencyRevenue {
                currency,
                amount_minor,
            })
            .collect();
        Ok(PlatformAnalytics::new(by_role, revenue, tokens_sold, tokens_spent))
    }
}
