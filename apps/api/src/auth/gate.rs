//! Credential & session gate: bearer token -> live account identity.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::token::TokenKeys;
use crate::errors::{AppError, AuthError};
use crate::models::account::{AccountStatus, Role};
use crate::store::Store;

/// The caller as resolved from the store for this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub tokens: i64,
    pub is_blocked: bool,
}

impl From<AccountStatus> for Identity {
    fn from(account: AccountStatus) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            tokens: account.tokens,
            is_blocked: account.is_blocked,
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies the credential and re-reads the account. Role, balance and the
/// block flag always come from the store, never from token claims.
pub async fn resolve_identity(
    store: &dyn Store,
    keys: &TokenKeys,
    headers: &HeaderMap,
) -> Result<Identity, AppError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthenticated)?;
    let claims = keys.verify(token).map_err(|e| {
        tracing::debug!("Rejected bearer token: {e}");
        AuthError::Unauthenticated
    })?;
    if claims.purpose.is_some() {
        return Err(AuthError::Unauthenticated.into());
    }

    let account = store
        .find_account(claims.sub)
        .await?
        .ok_or(AuthError::NotFound)?;
    if account.is_blocked {
        return Err(AuthError::Forbidden.into());
    }
    Ok(account.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;

    use crate::store::memory::{Fault, MemoryStore};

    fn keys() -> TokenKeys {
        TokenKeys::new("gate-secret")
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn session(id: Uuid, role: Role) -> HeaderMap {
        headers_with(&keys().issue_session(id, role, Duration::hours(1)).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_resolves_live_state() {
        let store = MemoryStore::new();
        let id = store.insert_account("emp@example.com", Role::Employer, 75);

        // Claims say CANDIDATE; the store is authoritative.
        let identity = resolve_identity(&store, &keys(), &session(id, Role::Candidate))
            .await
            .unwrap();
        assert_eq!(identity.id, id);
        assert_eq!(identity.role, Role::Employer);
        assert_eq!(identity.tokens, 75);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let store = MemoryStore::new();
        let result = resolve_identity(&store, &keys(), &HeaderMap::new()).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::Unauthenticated))));
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthenticated() {
        let store = MemoryStore::new();
        let id = store.insert_account("c@example.com", Role::Candidate, 0);
        let token = keys()
            .issue_session(id, Role::Candidate, Duration::seconds(-1))
            .unwrap();
        let result = resolve_identity(&store, &keys(), &headers_with(&token)).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::Unauthenticated))));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_not_found() {
        let store = MemoryStore::new();
        let result = resolve_identity(&store, &keys(), &session(Uuid::new_v4(), Role::Admin)).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::NotFound))));
    }

    #[tokio::test]
    async fn test_blocked_account_is_forbidden_immediately() {
        let store = MemoryStore::new();
        let id = store.insert_account("b@example.com", Role::Employer, 10);
        let headers = session(id, Role::Employer);
        assert!(resolve_identity(&store, &keys(), &headers).await.is_ok());

        store.set_blocked(id, true);
        let result = resolve_identity(&store, &keys(), &headers).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::Forbidden))));
    }

    #[tokio::test]
    async fn test_reset_token_is_not_a_session() {
        let store = MemoryStore::new();
        let id = store.insert_account("r@example.com", Role::Candidate, 0);
        let token = keys()
            .issue_password_reset(id, Role::Candidate, "fp".to_string())
            .unwrap();
        let result = resolve_identity(&store, &keys(), &headers_with(&token)).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::Unauthenticated))));
    }

    #[tokio::test]
    async fn test_lookup_fault_is_storage_error() {
        let store = MemoryStore::new();
        let id = store.insert_account("f@example.com", Role::Candidate, 0);
        store.inject_fault(Fault::Lookup);
        let result = resolve_identity(&store, &keys(), &session(id, Role::Candidate)).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
