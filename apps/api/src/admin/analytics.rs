//! Platform-wide figures for the admin dashboard.

use serde::Serialize;

use crate::models::account::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

/// Settled revenue in one currency, in its minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyRevenue {
    pub currency: String,
    pub amount_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformAnalytics {
    pub total_accounts: i64,
    pub accounts_by_role: Vec<RoleCount>,
    /// SUCCESS settlements only, one entry per currency, sorted by code.
    pub revenue: Vec<CurrencyRevenue>,
    pub tokens_sold: i64,
    pub tokens_spent: i64,
}

impl PlatformAnalytics {
    pub fn new(
        by_role: Vec<(Role, i64)>,
        mut revenue: Vec<CurrencyRevenue>,
        tokens_sold: i64,
        tokens_spent: i64,
    ) -> Self {
        let accounts_by_role = complete_role_counts(by_role);
        revenue.sort_by(|a, b| a.currency.cmp(&b.currency));
        Self {
            total_accounts: accounts_by_role.iter().map(|r| r.count).sum(),
            accounts_by_role,
            revenue,
            tokens_sold,
            tokens_spent,
        }
    }
}

/// Fills in roles with no accounts so the dashboard always sees all three.
pub fn complete_role_counts(found: Vec<(Role, i64)>) -> Vec<RoleCount> {
    Role::ALL
        .iter()
        .map(|role| RoleCount {
            role: *role,
            count: found
                .iter()
                .find(|(r, _)| r == role)
                .map(|(_, c)| *c)
                .unwrap_or(0),
        })
        .collect()
}
