//! Request-time authorization backed by the persisted role graph.
//!
//! Each request resolves its caller's roles and a policy snapshot of the
//! persisted role→permission graph, then asks the policy. Nothing outlives the
//! request, so a reconciliation that revokes a binding takes effect on the
//! next check.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use uniserp_auth::{
    AccessPolicy, Action, Caller, Decision, Permission, Principal, Resource, RoleName, RoleSet,
};
use uniserp_core::UserId;

use crate::store::{GrantRow, PersistenceError, RbacStore};

#[derive(Debug, Clone)]
enum PolicySource {
    /// Read from storage on every request.
    Persisted,
    /// Injected once (e.g. derived from a catalog).
    Fixed(Arc<AccessPolicy>),
}

#[derive(Debug, Clone)]
pub struct Authorizer<S> {
    store: S,
    source: PolicySource,
}

impl<S: RbacStore> Authorizer<S> {
    /// Authorize against the role→permission graph as currently stored.
    pub fn persisted(store: S) -> Self {
        Self {
            store,
            source: PolicySource::Persisted,
        }
    }

    /// Authorize against a fixed policy. Only role lookups hit storage.
    pub fn with_policy(store: S, policy: AccessPolicy) -> Self {
        Self {
            store,
            source: PolicySource::Fixed(Arc::new(policy)),
        }
    }

    /// The policy in force right now.
    pub async fn policy(&self) -> Result<Arc<AccessPolicy>, PersistenceError> {
        match &self.source {
            PolicySource::Fixed(policy) => Ok(policy.clone()),
            PolicySource::Persisted => Ok(Arc::new(self.snapshot().await?)),
        }
    }

    /// Build a policy from every persisted binding.
    ///
    /// Rows outside the vocabulary (created by hand, or by a newer catalog)
    /// grant nothing and are logged.
    #[instrument(skip(self), err)]
    async fn snapshot(&self) -> Result<AccessPolicy, PersistenceError> {
        let rows = self.store.role_grants().await?;
        let total = rows.len();

        let grants: Vec<(RoleName, Permission)> = rows.into_iter().filter_map(parse_grant).collect();

        debug!(total, usable = grants.len(), "role grants loaded");
        Ok(AccessPolicy::from_grants(grants))
    }

    /// Resolve who is calling. `None` means no active session.
    pub async fn resolve(&self, user: Option<UserId>) -> Result<Caller, PersistenceError> {
        let Some(user_id) = user else {
            return Ok(Caller::Anonymous);
        };

        let names = self.store.roles_for_user(user_id).await?;
        Ok(Caller::Authenticated(Principal::new(user_id, RoleSet::from_names(names))))
    }

    /// Full decision for a request expressed as raw tokens.
    pub async fn decide(
        &self,
        user: Option<UserId>,
        action: &str,
        resource: &str,
    ) -> Result<Decision, PersistenceError> {
        let caller = self.resolve(user).await?;
        let policy = self.policy().await?;
        Ok(uniserp_auth::check(&policy, &caller, action, resource))
    }

    /// Allow/deny for a request. Anonymous callers are always denied.
    pub async fn check(
        &self,
        user: Option<UserId>,
        action: &str,
        resource: &str,
    ) -> Result<bool, PersistenceError> {
        if user.is_none() {
            return Ok(false);
        }
        Ok(self.decide(user, action, resource).await?.is_allowed())
    }
}

fn parse_grant(row: GrantRow) -> Option<(RoleName, Permission)> {
    let parsed = (
        row.role.parse::<RoleName>(),
        row.action.parse::<Action>(),
        row.resource.parse::<Resource>(),
    );
    match parsed {
        (Ok(role), Ok(action), Ok(resource)) => Some((role, Permission::new(action, resource))),
        _ => {
            warn!(role = %row.role, action = %row.action, resource = %row.resource, "ignoring grant outside vocabulary");
            None
        }
    }
}
