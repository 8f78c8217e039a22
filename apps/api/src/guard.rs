//! Request guard: gate -> role filter -> body precheck -> token meter, in
//! that order.
//!
//! Attached per route group with `axum::middleware::from_fn_with_state`. On
//! success the resolved [`Identity`] is placed in request extensions.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::gate::{resolve_identity, Identity};
use crate::auth::roles::authorize;
use crate::billing::meter;
use crate::errors::AppError;
use crate::models::account::Role;
use crate::state::AppState;

/// Largest body the guard will buffer for a precheck.
const MAX_CHECKED_BODY: usize = 2 * 1024 * 1024;

/// Validates a buffered request body.
pub type BodyCheck = fn(&[u8]) -> Result<(), AppError>;

/// Input rules a metered request must pass before any tokens are taken.
pub trait Precheck {
    fn precheck(&self) -> Result<(), AppError>;
}

/// [`BodyCheck`] for a JSON body of type `T`.
pub fn precheck_json<T: DeserializeOwned + Precheck>(body: &[u8]) -> Result<(), AppError> {
    let parsed: T = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?;
    parsed.precheck()
}

/// Who may call a route, and what it costs.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub roles: &'static [Role],
    pub cost: Option<u32>,
    pub precheck: Option<BodyCheck>,
}

impl AccessPolicy {
    /// Any signed-in, unblocked account. Free.
    pub const fn any_account() -> Self {
        Self::roles(Role::ALL)
    }

    pub const fn roles(roles: &'static [Role]) -> Self {
        Self {
            roles,
            cost: None,
            precheck: None,
        }
    }

    pub const fn metered(roles: &'static [Role], cost: u32) -> Self {
        Self {
            roles,
            cost: Some(cost),
            precheck: None,
        }
    }

    /// Runs `check` on the body after the role filter and before the meter.
    pub const fn with_precheck(self, check: BodyCheck) -> Self {
        Self {
            precheck: Some(check),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct Guard {
    state: AppState,
    policy: AccessPolicy,
}

impl Guard {
    pub fn new(state: AppState, policy: AccessPolicy) -> Self {
        Self { state, policy }
    }
}

pub async fn guard_request(
    State(guard): State<Guard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Guard { state, policy } = guard;

    let mut identity: Identity =
        resolve_identity(state.store.as_ref(), &state.tokens, req.headers()).await?;
    authorize(&identity, policy.roles)?;

    if let Some(check) = policy.precheck {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_CHECKED_BODY)
            .await
            .map_err(|e| AppError::Validation(format!("Unreadable request body: {e}")))?;
        if let Err(e) = check(&bytes) {
            debug!("Rejected {} body for {} before charging: {e}", parts.uri.path(), identity.id);
            return Err(e);
        }
        req = Request::from_parts(parts, Body::from(bytes));
    }

    if let Some(cost) = policy.cost {
        let charged = meter::charge(state.store.as_ref(), identity.id, cost).await?;
        identity.tokens = charged.remaining;

        if charged.crossed_below(state.config.low_balance_threshold) {
            let mailer = state.mailer.clone();
            let email = identity.email.clone();
            let balance = charged.remaining;
            tokio::spawn(async move {
                if let Err(e) = mailer.send_low_balance_alert(&email, balance).await {
                    warn!("Low balance alert not delivered: {e}");
                }
            });
        }
    }

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
