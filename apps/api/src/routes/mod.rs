pub mod health;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::admin::handlers as admin;
use crate::auth::handlers as auth;
use crate::auth::roles::{ADMIN_ONLY, EMPLOYER_OR_ADMIN};
use crate::billing::handlers as billing;
use crate::billing::meter::NEURAL_MATCH_COST;
use crate::guard::{guard_request, precheck_json, AccessPolicy, Guard};
use crate::screening::handlers::{self as screening, NeuralMatchRequest};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route(
            "/api/v1/auth/forgot-password",
            post(auth::handle_forgot_password),
        )
        .route(
            "/api/v1/auth/reset-password",
            post(auth::handle_reset_password),
        )
        // Authenticated by body signature, not by session
        .route(
            "/api/v1/billing/settlements",
            post(billing::handle_settlement),
        );

    let signed_in = Router::new()
        .route("/api/v1/auth/me", get(auth::handle_me))
        .route(
            "/api/v1/users/change-password",
            post(auth::handle_change_password),
        )
        .route("/api/v1/users/profile", patch(auth::handle_update_profile))
        .route("/api/v1/billing/balance", get(billing::handle_balance))
        .route(
            "/api/v1/billing/transactions",
            get(billing::handle_my_transactions),
        )
        .route(
            "/api/v1/screening/resume",
            post(screening::handle_extract_resume),
        )
        .route(
            "/api/v1/screening/resume/upload",
            post(screening::handle_upload_resume),
        );

    let employers = Router::new().route(
        "/api/v1/billing/invoices",
        post(billing::handle_create_invoice),
    );

    let admins = Router::new()
        .route("/api/v1/admin/users", get(admin::handle_list_users))
        .route(
            "/api/v1/admin/users/:id/status",
            patch(admin::handle_set_status),
        )
        .route("/api/v1/admin/users/:id/logs", get(admin::handle_user_logs))
        .route(
            "/api/v1/admin/users/:id/transactions",
            get(admin::handle_user_transactions),
        )
        .route("/api/v1/admin/logs", get(admin::handle_logs))
        .route("/api/v1/admin/analytics", get(admin::handle_analytics));

    let metered = Router::new().route(
        "/api/v1/screening/match",
        post(screening::handle_neural_match),
    );

    Router::new()
        .merge(public)
        .merge(guarded(signed_in, &state, AccessPolicy::any_account()))
        .merge(guarded(
            employers,
            &state,
            AccessPolicy::roles(EMPLOYER_OR_ADMIN),
        ))
        .merge(guarded(admins, &state, AccessPolicy::roles(ADMIN_ONLY)))
        .merge(guarded(
            metered,
            &state,
            AccessPolicy::metered(EMPLOYER_OR_ADMIN, NEURAL_MATCH_COST)
                .with_precheck(precheck_json::<NeuralMatchRequest>),
        ))
        .with_state(state)
}

fn guarded(
    routes: Router<AppState>,
    state: &AppState,
    policy: AccessPolicy,
) -> Router<AppState> {
    routes.route_layer(from_fn_with_state(
        Guard::new(state.clone(), policy),
        guard_request,
    ))
}
