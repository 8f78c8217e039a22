use crate::auth::gate::Identity;
use crate::errors::AuthError;
use crate::models::account::Role;

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const EMPLOYER_OR_ADMIN: &[Role] = &[Role::Employer, Role::Admin];

/// Permits the request only if the caller's role is in `allowed`.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
