//! Transactional email over an HTTP mail API.
//!
//! When no API is configured, messages are logged instead of sent so local
//! setups still show reset links.

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API rejected message (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Clone)]
pub struct Mailer {
    client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
    from: String,
    frontend_url: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("Failed to build HTTP client"),
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
            frontend_url: config.frontend_url.clone(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let Some(api_url) = &self.api_url else {
            info!("Mail API not configured; would send '{subject}' to {}", mask_email(to));
            return Ok(());
        };

        let mut request = self.client.post(api_url).json(&OutgoingMail {
            from: &self.from,
            to,
            subject,
            html,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Mail API returned {status} for {}", mask_email(to));
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        info!("Sent '{subject}' to {}", mask_email(to));
        Ok(())
    }

    pub async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = reset_link(&self.frontend_url, token);
        if self.api_url.is_none() {
            info!("Password reset link for {}: {link}", mask_email(to));
        }
        let html = format!(
            "<h1>Reset your password</h1>\
             <p>We received a request to reset your RecruitIntel password.</p>\
             <p><a href=\"{link}\">Choose a new password</a></p>\
             <p>This link expires in 1 hour. If you did not request it, ignore this email.</p>"
        );
        self.send(to, "Reset your RecruitIntel password", &html).await
    }

    pub async fn send_low_balance_alert(&self, to: &str, balance: i64) -> Result<(), MailError> {
        let html = format!(
            "<h1>Low token balance</h1>\
             <p>Your balance is down to <strong>{balance} tokens</strong>.</p>\
             <p><a href=\"{}/employer/billing\">Top up</a> to keep AI screening running.</p>",
            self.frontend_url.trim_end_matches('/')
        );
        self.send(to, "Low token balance", &html).await
    }
}

pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={token}",
        frontend_url.trim_end_matches('/')
    )
}

/// `jane@example.com` -> `j***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let mut chars = local.chars();
            match chars.next() {
                Some(first) => format!("{first}{}@{domain}", "*".repeat(chars.count())),
                None => format!("@{domain}"),
            }
        }
        None => "***".to_string(),
    }
}
