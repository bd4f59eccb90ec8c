//! Resolved identities and the role predicate evaluated before operations.
use crate::error::AppError;
use crate::storage::{AccessGrant, User};
use tutorhub_common::Role;

/// Super-admin only
pub const SUPER_ADMIN: &[Role] = &[Role::SuperAdmin];

/// The caller of a request, resolved from its access grant
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub grant: AccessGrant,
}

/// Fail with `Forbidden` unless the principal's role is in `allowed`
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), AppError> {
    if principal.user.role.is_one_of(allowed) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = principal.user.id,
            role = %principal.user.role,
            "role not permitted"
        );
        Err(AppError::Forbidden)
    }
}
