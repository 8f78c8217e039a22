use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account role. Stored as the Postgres enum `account_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Employer,
    Candidate,
}

impl Role {
    pub const ALL: &'static [Role] = &[Role::Admin, Role::Employer, Role::Candidate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Employer => "EMPLOYER",
            Role::Candidate => "CANDIDATE",
        }
    }
}

/// Full account row, including the password credential. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub tokens: i64,
    pub is_blocked: bool,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public projection of an account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub tokens: i64,
    pub is_blocked: bool,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for AccountSummary {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            role: row.role,
            tokens: row.tokens,
            is_blocked: row.is_blocked,
            profile_picture_url: row.profile_picture_url,
            created_at: row.created_at,
        }
    }
}

/// The live fields the request gate needs, read fresh on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AccountStatus {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub tokens: i64,
    pub is_blocked: bool,
}
