use uuid::Uuid;

use crate::{
    auth::Identity,
    error::{ActionError, SelfProtection},
    models::Role,
};

/// Requirement
///
/// The minimum standing an action demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Member,
    Admin,
}

/// authorize
///
/// The per-action check, run first in every mutating handler regardless of what the
/// route gate already decided. When `owner` is given, the caller must either own the
/// record or be an administrator.
pub fn authorize(
    caller: Option<&Identity>,
    requirement: Requirement,
    owner: Option<Uuid>,
) -> Result<&Identity, ActionError> {
    let Some(identity) = caller else {
        tracing::debug!(?requirement, "denied anonymous caller");
        return Err(ActionError::Unauthenticated);
    };

    if requirement == Requirement::Admin && !identity.is_admin() {
        tracing::warn!(user_id = %identity.id, "denied admin action to non-admin");
        return Err(ActionError::Forbidden);
    }

    if let Some(owner_id) = owner {
        if owner_id != identity.id && !identity.is_admin() {
            tracing::warn!(user_id = %identity.id, %owner_id, "denied action on another user's record");
            return Err(ActionError::Forbidden);
        }
    }

    Ok(identity)
}

/// An administrator may not demote themselves; demoting another administrator is allowed.
pub fn guard_role_change(
    caller: &Identity,
    target: Uuid,
    new_role: Role,
) -> Result<(), ActionError> {
    if target == caller.id && caller.is_admin() && new_role == Role::User {
        tracing::warn!(user_id = %caller.id, "refused self-demotion");
        return Err(ActionError::SelfProtection(SelfProtection::Demotion));
    }
    Ok(())
}

pub fn guard_status_toggle(caller: &Identity, target: Uuid) -> Result<(), ActionError> {
    if target == caller.id {
        tracing::warn!(user_id = %caller.id, "refused self-disable");
        return Err(ActionError::SelfProtection(SelfProtection::Disable));
    }
    Ok(())
}
