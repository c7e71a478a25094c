//! Catalog → storage reconciliation.
//!
//! Makes persisted permissions, roles and their bindings match a [`Catalog`]
//! and gives existing users their default role. Safe to re-run any number of
//! times:
//!
//! 1. **Permissions** are find-or-create by `(action, resource)`. Existing rows
//!    are reused as-is; their description is never rewritten.
//! 2. **Roles** are find-or-create by name, then their permission bindings are
//!    destructively synced to the catalog list.
//! 3. **Users** whose `user_type` names a persisted role get that role if they
//!    do not hold it already. Bindings are only ever added.
//!
//! All three steps share one transaction. A failed run leaves storage exactly
//! as it found it; callers retry by running again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use uniserp_auth::{Catalog, CatalogError, Permission, RoleName};
use uniserp_core::{PermissionId, RoleId};

use crate::store::{PersistenceError, RbacStore, RbacTransaction};

/// What to do with a role that references a permission missing from the
/// permission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPermissionPolicy {
    /// Abort before writing anything.
    #[default]
    Fail,
    /// Log the reference, leave the binding out and carry on.
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub unresolved: UnresolvedPermissionPolicy,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Counts of what one run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub permissions_inserted: usize,
    pub permissions_reused: usize,
    pub roles_inserted: usize,
    pub roles_reused: usize,
    pub bindings_removed: u64,
    pub bindings_inserted: usize,
    /// `(role, permission)` references left out under [`UnresolvedPermissionPolicy::Skip`].
    pub skipped_references: Vec<(RoleName, Permission)>,
    pub user_roles_assigned: usize,
    pub user_roles_present: usize,
    /// Users whose `user_type` names no persisted role.
    pub users_unmatched: usize,
}

impl ReconcileReport {
    fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            permissions_inserted: 0,
            permissions_reused: 0,
            roles_inserted: 0,
            roles_reused: 0,
            bindings_removed: 0,
            bindings_inserted: 0,
            skipped_references: Vec::new(),
            user_roles_assigned: 0,
            user_roles_present: 0,
            users_unmatched: 0,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Provisions a catalog into an [`RbacStore`].
#[derive(Debug, Clone)]
pub struct RbacReconciler<S> {
    store: S,
    catalog: Arc<Catalog>,
    options: ReconcileOptions,
}

impl<S: RbacStore> RbacReconciler<S> {
    pub fn new(store: S, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            catalog,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run one full reconciliation.
    #[instrument(
        skip(self),
        fields(
            permissions = self.catalog.permissions.len(),
            roles = self.catalog.roles.len(),
            unresolved_policy = ?self.options.unresolved
        ),
        err
    )]
    pub async fn reconcile(&self) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::started(Utc::now());
        let skipped = self.preflight()?;

        let mut tx = self.store.begin().await?;

        let index = self.sync_permissions(&mut tx, &mut report).await?;
        info!(
            inserted = report.permissions_inserted,
            reused = report.permissions_reused,
            "permissions reconciled"
        );

        self.sync_roles(&mut tx, &index, &mut report).await?;
        info!(
            inserted = report.roles_inserted,
            reused = report.roles_reused,
            bindings_removed = report.bindings_removed,
            bindings_inserted = report.bindings_inserted,
            "roles reconciled"
        );

        self.assign_default_roles(&mut tx, &mut report).await?;
        info!(
            assigned = report.user_roles_assigned,
            already_present = report.user_roles_present,
            unmatched = report.users_unmatched,
            "default user roles reconciled"
        );

        tx.commit().await?;

        report.skipped_references = skipped;
        report.finished_at = Utc::now();
        info!(duration_ms = report.duration_ms(), "reconciliation committed");
        Ok(report)
    }

    /// Validate the catalog before touching storage. Returns the references to
    /// leave out when running lenient.
    fn preflight(&self) -> Result<Vec<(RoleName, Permission)>, ReconcileError> {
        self.catalog.check_unique()?;

        let unresolved = self.catalog.unresolved_references();
        match (self.options.unresolved, unresolved.first()) {
            (_, None) => Ok(unresolved),
            (UnresolvedPermissionPolicy::Fail, Some(&(role, permission))) => {
                Err(CatalogError::UnresolvedReference { role, permission }.into())
            }
            (UnresolvedPermissionPolicy::Skip, Some(_)) => {
                for (role, permission) in &unresolved {
                    warn!(%role, %permission, "role references an undeclared permission; skipping binding");
                }
                Ok(unresolved)
            }
        }
    }

    async fn sync_permissions(
        &self,
        tx: &mut S::Tx,
        report: &mut ReconcileReport,
    ) -> Result<HashMap<Permission, PermissionId>, PersistenceError> {
        let mut index = HashMap::with_capacity(self.catalog.permissions.len());

        for spec in &self.catalog.permissions {
            let permission = spec.permission();
            let record = match tx.find_permission(permission).await? {
                Some(existing) => {
                    report.permissions_reused += 1;
                    existing
                }
                None => {
                    report.permissions_inserted += 1;
                    tx.insert_permission(spec).await?
                }
            };
            index.insert(permission, record.id);
        }

        Ok(index)
    }

    async fn sync_roles(
        &self,
        tx: &mut S::Tx,
        index: &HashMap<Permission, PermissionId>,
        report: &mut ReconcileReport,
    ) -> Result<(), PersistenceError> {
        for spec in &self.catalog.roles {
            let role = match tx.find_role(spec.name.as_str()).await? {
                Some(existing) => {
                    report.roles_reused += 1;
                    existing
                }
                None => {
                    report.roles_inserted += 1;
                    tx.insert_role(spec).await?
                }
            };

            report.bindings_removed += tx.clear_role_permissions(role.id).await?;

            let mut bound = HashSet::new();
            for permission in &spec.permissions {
                // Unresolved references were either rejected in preflight or
                // accepted for skipping there.
                let Some(&permission_id) = index.get(permission) else {
                    continue;
                };
                if bound.insert(permission_id) {
                    tx.insert_role_permission(role.id, permission_id).await?;
                }
            }
            report.bindings_inserted += bound.len();
            debug!(role = %spec.name, bindings = bound.len(), "role permissions rebound");
        }

        Ok(())
    }

    async fn assign_default_roles(
        &self,
        tx: &mut S::Tx,
        report: &mut ReconcileReport,
    ) -> Result<(), PersistenceError> {
        let users = tx.list_users().await?;
        let mut roles_by_type: HashMap<String, Option<RoleId>> = HashMap::new();

        for user in users {
            let role_id = match roles_by_type.get(&user.user_type) {
                Some(cached) => *cached,
                None => {
                    let found = tx.find_role(&user.user_type).await?.map(|r| r.id);
                    roles_by_type.insert(user.user_type.clone(), found);
                    found
                }
            };

            let Some(role_id) = role_id else {
                report.users_unmatched += 1;
                debug!(user_id = %user.id, user_type = %user.user_type, "no role matches user type");
                continue;
            };

            if tx.has_user_role(user.id, role_id).await? {
                report.user_roles_present += 1;
            } else {
                tx.insert_user_role(user.id, role_id).await?;
                report.user_roles_assigned += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniserp_auth::{Action, Resource};

    #[test]
    fn strict_policy_is_the_default() {
        assert_eq!(ReconcileOptions::default().unresolved, UnresolvedPermissionPolicy::Fail);
    }

    #[test]
    fn report_serializes_skipped_references_as_tokens() {
        let mut report = ReconcileReport::started(Utc::now());
        report.skipped_references = vec![(
            RoleName::Student,
            Permission::new(Action::View, Resource::Hostels),
        )];

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped_references"], serde_json::json!([["student", "view:hostels"]]));
        assert_eq!(report.duration_ms(), 0);
    }
}
