use thiserror::Error;

use crate::permissions::Permission;
use crate::policy::{AccessPolicy, Decision};
use crate::principal::Caller;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions. Callers should
/// enforce these requirements before executing the command.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a caller for a single permission.
///
/// Anonymous callers never pass, whatever the policy says.
pub fn authorize(
    policy: &AccessPolicy,
    caller: &Caller,
    required: Permission,
) -> Result<(), AuthzError> {
    let Caller::Authenticated(principal) = caller else {
        return Err(AuthzError::Unauthenticated);
    };

    if policy.permits(&principal.roles, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Authorize every permission a command declares.
pub fn authorize_command<C: CommandAuthorization>(
    policy: &AccessPolicy,
    caller: &Caller,
    command: &C,
) -> Result<(), AuthzError> {
    for permission in command.required_permissions() {
        authorize(policy, caller, *permission)?;
    }
    Ok(())
}

/// Check a request expressed as raw tokens, returning the full decision.
///
/// This is the entry point for UI gating: the caller renders its fallback for
/// anything other than `Decision::Allowed`.
pub fn check(policy: &AccessPolicy, caller: &Caller, action: &str, resource: &str) -> Decision {
    policy.evaluate(&caller.roles(), action, resource)
}
