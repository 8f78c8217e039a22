use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::gate::Identity;
use crate::billing::invoice::{generate_invoice, Invoice};
use crate::billing::settlement::{normalize_currency, settle_payment, DEFAULT_CURRENCY};
use crate::billing::webhook::{verify_body, SIGNATURE_HEADER};
use crate::errors::{AppError, AuthError};
use crate::models::ledger::{Gateway, TransactionRow};
use crate::state::AppState;
use crate::store::SettlementReceipt;

const LEDGER_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct SettlementRequest {
    pub account_id: Uuid,
    /// The gateway's id for the payment. Redelivered callbacks repeat it.
    pub payment_ref: String,
    pub amount_minor: i64,
    pub currency: Option<String>,
    pub gateway: Gateway,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub tokens: i64,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    pub amount_minor: i64,
    pub currency: Option<String>,
}

/// POST /api/v1/billing/settlements
/// Called by the payment collaborator once the gateway has confirmed funds.
pub async fn handle_settlement(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SettlementReceipt>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthenticated)?;
    if !verify_body(&state.config.payment_webhook_secret, &body, signature) {
        tracing::warn!("Rejected settlement callback with a bad signature");
        return Err(AuthError::Unauthenticated.into());
    }

    let req: SettlementRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid settlement payload: {e}")))?;
    let currency = req.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);

    let receipt = settle_payment(
        state.store.as_ref(),
        req.account_id,
        &req.payment_ref,
        req.amount_minor,
        currency,
        req.gateway,
        state.config.tokens_per_currency_unit,
    )
    .await?;
    Ok(Json(receipt))
}

/// GET /api/v1/billing/balance
pub async fn handle_balance(Extension(identity): Extension<Identity>) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        tokens: identity.tokens,
    })
}

/// GET /api/v1/billing/transactions
pub async fn handle_my_transactions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<TransactionRow>>, AppError> {
    Ok(Json(list_transactions(&state, identity.id).await?))
}

/// POST /api/v1/billing/invoices
pub async fn handle_create_invoice(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<InvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    if req.amount_minor <= 0 {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    let currency = normalize_currency(req.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))?;
    Ok(Json(generate_invoice(
        identity.id,
        req.amount_minor,
        &currency,
        state.config.tokens_per_currency_unit,
        Utc::now(),
    )))
}

pub(crate) async fn list_transactions(
    state: &AppState,
    account_id: Uuid,
) -> Result<Vec<TransactionRow>, AppError> {
    Ok(state
        .store
        .list_transactions(account_id, LEDGER_PAGE_SIZE)
        .await?)
}
