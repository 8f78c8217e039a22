use axum::{extract::State, Extension, Json};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::audit::{self, AuditAction};
use crate::auth::gate::Identity;
use crate::auth::password::{hash_with_iterations, password_fingerprint, verify_password};
use crate::auth::token::PASSWORD_RESET_PURPOSE;
use crate::errors::{AppError, AuthError, StorageFault};
use crate::models::account::{AccountSummary, Role};
use crate::notify::mask_email;
use crate::state::AppState;
use crate::store::NewAccount;

const MIN_PASSWORD_LEN: usize = 8;
const RESET_REQUESTED_MESSAGE: &str =
    "If that email is in our system, you will receive a reset link.";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountSummary,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AccountSummary>, AppError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let role = req.role.unwrap_or(Role::Candidate);
    if role == Role::Admin {
        return Err(AuthError::Forbidden.into());
    }

    let password_hash = hash_blocking(req.password, state.config.password_iterations).await?;
    let account = state
        .store
        .create_account(&NewAccount {
            email,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            StorageFault::DuplicateEmail => AppError::Conflict(e.to_string()),
            other => other.into(),
        })?;

    info!("Registered {} account {}", role.as_str(), account.id);
    audit::record(
        state.store.as_ref(),
        Some(account.id),
        AuditAction::UserRegistered,
        json!({ "role": role }),
    )
    .await;

    Ok(Json(account))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    let account = state.store.find_by_email(&email).await?;

    // Same answer for unknown email and wrong password.
    let account = account.ok_or(AuthError::Unauthenticated)?;
    if !verify_blocking(req.password, account.password_hash.clone()).await? {
        info!("Failed login for {}", mask_email(&email));
        return Err(AuthError::Unauthenticated.into());
    }
    if account.is_blocked {
        return Err(AuthError::Forbidden.into());
    }

    let token = state
        .tokens
        .issue_session(
            account.id,
            account.role,
            Duration::hours(state.config.session_ttl_hours),
        )
        .map_err(|e| AppError::Internal(e.into()))?;
    audit::record(
        state.store.as_ref(),
        Some(account.id),
        AuditAction::UserLogin,
        json!({}),
    )
    .await;

    Ok(Json(LoginResponse {
        token,
        user: account.into(),
    }))
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<AccountSummary>, AppError> {
    let account = state
        .store
        .find_account_row(identity.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", identity.id)))?;
    Ok(Json(account.into()))
}

/// POST /api/v1/auth/forgot-password
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = req.email.trim().to_lowercase();

    if let Some(account) = state.store.find_by_email(&email).await? {
        let token = state
            .tokens
            .issue_password_reset(
                account.id,
                account.role,
                password_fingerprint(&account.password_hash),
            )
            .map_err(|e| AppError::Internal(e.into()))?;
        state
            .mailer
            .send_password_reset(&email, &token)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("reset email failed: {e}")))?;
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE,
    }))
}

/// POST /api/v1/auth/reset-password
///
/// A reset token names the password hash it was issued against, so it stops
/// working as soon as the password changes, including through its own use.
pub async fn handle_reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let claims = state
        .tokens
        .verify(&req.token)
        .map_err(|_| AuthError::Unauthenticated)?;
    if claims.purpose.as_deref() != Some(PASSWORD_RESET_PURPOSE) {
        return Err(AuthError::Unauthenticated.into());
    }
    validate_password(&req.password)?;

    let account = state
        .store
        .find_account_row(claims.sub)
        .await?
        .ok_or(AuthError::Unauthenticated)?;
    let current = password_fingerprint(&account.password_hash);
    if claims.pwd.as_deref() != Some(current.as_str()) {
        info!("Rejected spent reset token for {}", claims.sub);
        return Err(AuthError::Unauthenticated.into());
    }

    let password_hash = hash_blocking(req.password, state.config.password_iterations).await?;
    if !state.store.set_password(claims.sub, &password_hash).await? {
        return Err(AuthError::Unauthenticated.into());
    }

    audit::record(
        state.store.as_ref(),
        Some(claims.sub),
        AuditAction::PasswordReset,
        json!({}),
    )
    .await;

    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}

/// POST /api/v1/users/change-password
pub async fn handle_change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_password(&req.new_password)?;

    let stored = state
        .store
        .find_account_row(identity.id)
        .await?
        .ok_or(AuthError::NotFound)?
        .password_hash;
    if !verify_blocking(req.current_password, stored).await? {
        return Err(AppError::Validation(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_blocking(req.new_password, state.config.password_iterations).await?;
    if !state.store.set_password(identity.id, &password_hash).await? {
        return Err(AuthError::NotFound.into());
    }

    audit::record(
        state.store.as_ref(),
        Some(identity.id),
        AuditAction::PasswordChanged,
        json!({}),
    )
    .await;

    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}

/// PATCH /api/v1/users/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AccountSummary>, AppError> {
    let picture = normalize_picture_url(req.profile_picture_url)?;
    let account = state
        .store
        .update_profile_picture(identity.id, picture)
        .await?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(account))
}

async fn hash_blocking(password: String, iterations: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_with_iterations(&password, iterations))
        .await
        .map_err(|e| AppError::Internal(e.into()))
}

async fn verify_blocking(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(e.into()))
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(AppError::Validation("A valid email address is required".to_string()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn normalize_picture_url(url: Option<String>) -> Result<Option<String>, AppError> {
    match url.map(|u| u.trim().to_string()) {
        None => Ok(None),
        Some(u) if u.is_empty() => Ok(None),
        Some(u) if u.starts_with("https://") || u.starts_with("http://") => Ok(Some(u)),
        Some(_) => Err(AppError::Validation(
            "profile_picture_url must be an http(s) URL".to_string(),
        )),
    }
}
