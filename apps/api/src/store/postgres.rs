use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::admin::analytics::{CurrencyRevenue, PlatformAnalytics};
use crate::audit::{deduction_details, payment_details, AuditAction};
use crate::errors::StorageFault;
use crate::models::account::{AccountRow, AccountStatus, AccountSummary, Role};
use crate::models::audit::AuditLogRow;
use crate::models::ledger::{TransactionRow, TransactionStatus};
use crate::store::{
    AuditQuery, DebitOutcome, NewAccount, NewAuditEntry, NewSettlement, SettlementReceipt, Store,
};

const SUMMARY_COLUMNS: &str = "id, email, role, tokens, is_blocked, profile_picture_url, created_at";

/// Postgres-backed store. Shares the process-wide pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Receipt of the SUCCESS row already booked for this payment reference.
    async fn booked_receipt(
        &self,
        settlement: &NewSettlement,
    ) -> Result<SettlementReceipt, StorageFault> {
        let (transaction_id, account_id, tokens_added, balance): (Uuid, Uuid, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT t.id, t.account_id, t.tokens_added, a.tokens
                FROM transactions t
                JOIN accounts a ON a.id = t.account_id
                WHERE t.gateway = $1 AND t.payment_ref = $2 AND t.status = 'SUCCESS'
                "#,
            )
            .bind(settlement.gateway)
            .bind(&settlement.payment_ref)
            .fetch_one(&self.pool)
            .await?;

        Ok(SettlementReceipt {
            transaction_id,
            account_id,
            tokens_added,
            balance,
            replayed: true,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_account(&self, id: Uuid) -> Result<Option<AccountStatus>, StorageFault> {
        Ok(sqlx::query_as::<_, AccountStatus>(
            "SELECT id, email, role, tokens, is_blocked FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn debit_tokens(&self, account_id: Uuid, cost: i64) -> Result<DebitOutcome, StorageFault> {
        let mut tx = self.pool.begin().await?;

        // Check and decrement in one statement; the row lock serializes concurrent debits.
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET tokens = tokens - $1 WHERE id = $2 AND tokens >= $1 RETURNING tokens",
        )
        .bind(cost)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT tokens FROM accounts WHERE id = $1")
                    .bind(account_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Ok(match current {
                Some(current) => DebitOutcome::Insufficient { current },
                None => DebitOutcome::AccountMissing,
            });
        };

        sqlx::query("INSERT INTO audit_log (account_id, action, details) VALUES ($1, $2, $3)")
            .bind(account_id)
            .bind(AuditAction::TokenDeduction.as_str())
            .bind(deduction_details(cost, remaining))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Debited {cost} tokens from {account_id}, {remaining} remaining");
        Ok(DebitOutcome::Debited { remaining })
    }

    async fn settle_payment(
        &self,
        settlement: &NewSettlement,
    ) -> Result<SettlementReceipt, StorageFault> {
        // Dropping `tx` on any early return rolls the whole unit back.
        let mut tx = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO transactions
                (account_id, payment_ref, tokens_added, amount_minor, currency, token_rate, gateway, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (gateway, payment_ref) WHERE status = 'SUCCESS' DO NOTHING
            RETURNING id
            "#,
        )
        .bind(settlement.account_id)
        .bind(&settlement.payment_ref)
        .bind(settlement.tokens_added)
        .bind(settlement.amount_minor)
        .bind(&settlement.currency)
        .bind(settlement.token_rate as i32)
        .bind(settlement.gateway)
        .bind(TransactionStatus::Success)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(transaction_id) = inserted else {
            tx.rollback().await?;
            info!(
                "{:?} payment {} already booked, not crediting again",
                settlement.gateway, settlement.payment_ref
            );
            return self.booked_receipt(settlement).await;
        };

        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET tokens = tokens + $1 WHERE id = $2 RETURNING tokens",
        )
        .bind(settlement.tokens_added)
        .bind(settlement.account_id)
        .fetch_optional(&mut *tx)
        .await?;
        let balance = balance.ok_or(StorageFault::MissingAccount(settlement.account_id))?;

        sqlx::query("INSERT INTO audit_log (account_id, action, details) VALUES ($1, $2, $3)")
            .bind(settlement.account_id)
            .bind(AuditAction::PaymentReceived.as_str())
            .bind(payment_details(
                transaction_id,
                settlement.amount_minor,
                settlement.tokens_added,
            ))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

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
        Ok(sqlx::query_scalar(
            r#"
            INSERT INTO transactions
                (account_id, payment_ref, tokens_added, amount_minor, currency, token_rate, gateway, status, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(settlement.account_id)
        .bind(&settlement.payment_ref)
        .bind(settlement.tokens_added)
        .bind(settlement.amount_minor)
        .bind(&settlement.currency)
        .bind(settlement.token_rate as i32)
        .bind(settlement.gateway)
        .bind(TransactionStatus::Failed)
        .bind(reason)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StorageFault> {
        sqlx::query("INSERT INTO audit_log (account_id, action, details) VALUES ($1, $2, $3)")
            .bind(entry.account_id)
            .bind(entry.action)
            .bind(entry.details)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<AccountSummary, StorageFault> {
        sqlx::query_as::<_, AccountSummary>(&format!(
            "INSERT INTO accounts (email, password_hash, role) VALUES ($1, $2, $3) RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageFault::DuplicateEmail,
            other => StorageFault::Database(other),
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRow>, StorageFault> {
        Ok(
            sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_account_row(&self, id: Uuid) -> Result<Option<AccountRow>, StorageFault> {
        Ok(
            sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StorageFault> {
        let updated = sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    async fn update_profile_picture(
        &self,
        id: Uuid,
        url: Option<String>,
    ) -> Result<Option<AccountSummary>, StorageFault> {
        Ok(sqlx::query_as::<_, AccountSummary>(&format!(
            "UPDATE accounts SET profile_picture_url = $1 WHERE id = $2 RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> Result<Option<AccountSummary>, StorageFault> {
        Ok(sqlx::query_as::<_, AccountSummary>(&format!(
            "UPDATE accounts SET is_blocked = $1 WHERE id = $2 RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(blocked)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StorageFault> {
        Ok(sqlx::query_as::<_, AccountSummary>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM accounts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionRow>, StorageFault> {
        Ok(sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogRow>, StorageFault> {
        Ok(sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT * FROM audit_log
            WHERE ($1::UUID IS NULL OR account_id = $1)
              AND ($2::TEXT IS NULL OR action = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.account_id)
        .bind(query.action.as_deref())
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn analytics(&self) -> Result<PlatformAnalytics, StorageFault> {
        let by_role: Vec<(Role, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM accounts GROUP BY role")
                .fetch_all(&self.pool)
                .await?;

        let revenue: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT currency, SUM(amount_minor)::BIGINT
            FROM transactions
            WHERE status = 'SUCCESS'
            GROUP BY currency
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tokens_sold: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(tokens_added), 0)::BIGINT FROM transactions WHERE status = 'SUCCESS'",
        )
        .fetch_one(&self.pool)
        .await?;

        let tokens_spent: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM((details->>'cost')::BIGINT), 0)::BIGINT
            FROM audit_log
            WHERE action = 'TOKEN_DEDUCTION'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::create_pool;
    use crate::models::ledger::Gateway;

    // These run against a real Postgres (DATABASE_URL, migrated on connect).
    // Every test works on freshly created accounts, so a shared database is fine.
    // cargo test -- --ignored

    async fn pg_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        PgStore::new(create_pool(&url).await.expect("connect and migrate"))
    }

    async fn account_with(store: &PgStore, tokens: i64) -> Uuid {
        let account = store
            .create_account(&NewAccount {
                email: format!("{}@pgstore.test", Uuid::new_v4()),
                password_hash: "unused".to_string(),
                role: Role::Employer,
            })
            .await
            .unwrap();
        sqlx::query("UPDATE accounts SET tokens = $1 WHERE id = $2")
            .bind(tokens)
            .bind(account.id)
            .execute(&store.pool)
            .await
            .unwrap();
        account.id
    }

    fn settlement(account_id: Uuid, payment_ref: &str) -> NewSettlement {
        NewSettlement {
            account_id,
            payment_ref: payment_ref.to_string(),
            tokens_added: 50,
            amount_minor: 500,
            currency: "USD".to_string(),
            token_rate: 10,
            gateway: Gateway::Stripe,
        }
    }

    async fn audit_for(store: &PgStore, account_id: Uuid, action: &str) -> Vec<AuditLogRow> {
        store
            .list_audit(&AuditQuery {
                account_id: Some(account_id),
                action: Some(action.to_string()),
                limit: 100,
            })
            .await
            .unwrap()
    }

    async fn balance(store: &PgStore, id: Uuid) -> i64 {
        store.find_account(id).await.unwrap().unwrap().tokens
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore]
    async fn test_concurrent_debits_never_overdraw() {
        const CALLS: usize = 12;
        let store = Arc::new(pg_store().await);
        // 100 tokens cover exactly three debits of 30.
        let id = account_with(&store, 100).await;

        let handles: Vec<_> = (0..CALLS)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.debit_tokens(id, 30).await })
            })
            .collect();

        let mut debited = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                DebitOutcome::Debited { .. } => debited += 1,
                DebitOutcome::Insufficient { .. } => insufficient += 1,
                DebitOutcome::AccountMissing => panic!("account vanished"),
            }
        }

        assert_eq!(debited, 3);
        assert_eq!(insufficient, CALLS - 3);
        assert_eq!(balance(&store, id).await, 10);
        assert_eq!(audit_for(&store, id, "TOKEN_DEDUCTION").await.len(), 3);
    }

    #[tokio::test]
    #[ignore]
    async fn test_insufficient_debit_rolls_back() {
        let store = pg_store().await;
        let id = account_with(&store, 15).await;

        let outcome = store.debit_tokens(id, 20).await.unwrap();
        assert_eq!(outcome, DebitOutcome::Insufficient { current: 15 });
        assert_eq!(balance(&store, id).await, 15);
        assert!(audit_for(&store, id, "TOKEN_DEDUCTION").await.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_debit_of_unknown_account() {
        let store = pg_store().await;
        let outcome = store.debit_tokens(Uuid::new_v4(), 1).await.unwrap();
        assert_eq!(outcome, DebitOutcome::AccountMissing);
    }

    #[tokio::test]
    #[ignore]
    async fn test_settlement_credits_fifty_for_five_units() {
        let store = pg_store().await;
        let id = account_with(&store, 0).await;
        let payment_ref = format!("pi_{}", Uuid::new_v4());

        let receipt = store.settle_payment(&settlement(id, &payment_ref)).await.unwrap();
        assert!(!receipt.replayed);
        assert_eq!(receipt.balance, 50);
        assert_eq!(balance(&store, id).await, 50);

        let ledger = store.list_transactions(id, 10).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].id, receipt.transaction_id);
        assert_eq!(ledger[0].status, TransactionStatus::Success);
        assert_eq!(ledger[0].tokens_added, 50);

        let received = audit_for(&store, id, "PAYMENT_RECEIVED").await;
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].details["transaction_id"],
            receipt.transaction_id.to_string()
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_repeated_payment_ref_is_booked_once() {
        let store = pg_store().await;
        let id = account_with(&store, 0).await;
        let payment_ref = format!("pi_{}", Uuid::new_v4());

        let first = store.settle_payment(&settlement(id, &payment_ref)).await.unwrap();
        let second = store.settle_payment(&settlement(id, &payment_ref)).await.unwrap();

        assert!(second.replayed);
        assert_eq!(second.transaction_id, first.transaction_id);
        assert_eq!(balance(&store, id).await, 50);
        assert_eq!(store.list_transactions(id, 10).await.unwrap().len(), 1);
        assert_eq!(audit_for(&store, id, "PAYMENT_RECEIVED").await.len(), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_settlement_for_unknown_account_leaves_no_row() {
        let store = pg_store().await;
        let payment_ref = format!("pi_{}", Uuid::new_v4());

        let result = store
            .settle_payment(&settlement(Uuid::new_v4(), &payment_ref))
            .await;
        assert!(result.is_err());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE payment_ref = $1")
            .bind(&payment_ref)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_email_is_reported() {
        let store = pg_store().await;
        let email = format!("{}@pgstore.test", Uuid::new_v4());
        let new = NewAccount {
            email,
            password_hash: "unused".to_string(),
            role: Role::Candidate,
        };
        store.create_account(&new).await.unwrap();
        let err = store.create_account(&new).await.unwrap_err();
        assert!(matches!(err, StorageFault::DuplicateEmail));
    }
}
