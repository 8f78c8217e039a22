use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::admin::analytics::PlatformAnalytics;
use crate::audit::{self, AuditAction};
use crate::auth::gate::Identity;
use crate::billing::handlers::list_transactions;
use crate::errors::AppError;
use crate::models::account::AccountSummary;
use crate::models::audit::AuditLogRow;
use crate::models::ledger::TransactionRow;
use crate::state::AppState;
use crate::store::AuditQuery;

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub is_blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub action: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountSummary>>, AppError> {
    Ok(Json(state.store.list_accounts().await?))
}

/// PATCH /api/v1/admin/users/:id/status
pub async fn handle_set_status(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    Path(target): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<AccountSummary>, AppError> {
    ensure_not_self(admin.id, target, req.is_blocked)?;

    let account = state
        .store
        .update_blocked(target, req.is_blocked)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {target} not found")))?;

    let action = if req.is_blocked {
        AuditAction::BlockUser
    } else {
        AuditAction::UnblockUser
    };
    info!("Admin {} set is_blocked={} on {target}", admin.id, req.is_blocked);
    audit::record(
        state.store.as_ref(),
        Some(admin.id),
        action,
        json!({ "target_id": target }),
    )
    .await;

    Ok(Json(account))
}

/// GET /api/v1/admin/users/:id/logs
pub async fn handle_user_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    let query = AuditQuery {
        account_id: Some(id),
        action: None,
        limit: MAX_LOG_LIMIT,
    };
    Ok(Json(state.store.list_audit(&query).await?))
}

/// GET /api/v1/admin/users/:id/transactions
pub async fn handle_user_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransactionRow>>, AppError> {
    Ok(Json(list_transactions(&state, id).await?))
}

/// GET /api/v1/admin/logs?action=&limit=
pub async fn handle_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    let query = AuditQuery {
        account_id: None,
        action: query
            .action
            .map(|a| a.trim().to_uppercase())
            .filter(|a| !a.is_empty()),
        limit: clamp_limit(query.limit),
    };
    Ok(Json(state.store.list_audit(&query).await?))
}

/// GET /api/v1/admin/analytics
pub async fn handle_analytics(
    State(state): State<AppState>,
) -> Result<Json<PlatformAnalytics>, AppError> {
    Ok(Json(state.store.analytics().await?))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
}

/// An admin may lift its own block but never set one.
fn ensure_not_self(admin: Uuid, target: Uuid, blocking: bool) -> Result<(), AppError> {
    if blocking && admin == target {
        return Err(AppError::Validation(
            "Administrators cannot block their own account".to_string(),
        ));
    }
    Ok(())
}
