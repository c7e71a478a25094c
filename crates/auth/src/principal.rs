use serde::{Deserialize, Serialize};

use uniserp_core::UserId;

use crate::roles::RoleSet;

/// An authenticated user together with the roles resolved for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: RoleSet,
}

impl Principal {
    pub fn new(user_id: UserId, roles: RoleSet) -> Self {
        Self { user_id, roles }
    }
}

/// Whoever is asking for access.
///
/// Construction is decoupled from transport and storage: the session layer
/// decides who is authenticated, the role lookup decides which roles they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Caller {
    Anonymous,
    Authenticated(Principal),
}

impl Caller {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated(p) => Some(p.user_id),
        }
    }

    /// Roles held by the caller; empty for anonymous callers.
    pub fn roles(&self) -> RoleSet {
        match self {
            Caller::Anonymous => RoleSet::new(),
            Caller::Authenticated(p) => p.roles.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated(_))
    }
}
