use std::sync::Arc;

use crate::auth::token::TokenKeys;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::notify::Mailer;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Every read and write of accounts, the ledger and the audit log.
    /// `PgStore` in production.
    pub store: Arc<dyn Store>,
    pub tokens: TokenKeys,
    pub llm: LlmClient,
    pub mailer: Mailer,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// State over the given store. Nothing in it dials out.
    pub fn for_tests(store: Arc<dyn Store>) -> Self {
        let config = Config::for_tests();
        Self {
            store,
            tokens: TokenKeys::new(&config.jwt_secret),
            llm: LlmClient::new(config.gemini_api_key.clone()),
            mailer: Mailer::new(&config),
            config,
        }
    }
}
