use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use uniserp_auth::{Permission, PermissionSpec, RoleSpec};
use uniserp_core::{Entity, PermissionId, RoleId, UserId};

use super::r#trait::{
    GrantRow, PermissionRecord, PersistenceError, RbacStore, RbacTransaction, RoleRecord,
    UserRecord,
};

#[derive(Debug, Clone, Default)]
struct RbacState {
    permissions: Vec<PermissionRecord>,
    roles: Vec<RoleRecord>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    users: Vec<UserRecord>,
    user_roles: BTreeSet<(UserId, RoleId)>,
    /// Bumped by every committed write.
    version: u64,
}

impl RbacState {
    fn role_by_name(&self, name: &str) -> Option<&RoleRecord> {
        self.roles.iter().find(|r| r.name == name)
    }

    fn role_name(&self, id: RoleId) -> Option<&str> {
        by_id(&self.roles, &id).map(|r| r.name.as_str())
    }

    fn permission(&self, id: PermissionId) -> Option<&PermissionRecord> {
        by_id(&self.permissions, &id)
    }
}

fn by_id<'a, E: Entity>(rows: &'a [E], id: &E::Id) -> Option<&'a E> {
    rows.iter().find(|row| row.id() == id)
}

/// In-memory RBAC store for tests/dev.
///
/// A transaction works on a private copy of the state taken at `begin`; commit
/// swaps the copy in. Commit is optimistic: if anything else wrote to the store
/// after `begin` (another transaction or a seeding helper), it fails with
/// `Conflict` and the other write stands.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRbacStore {
    state: Arc<RwLock<RbacState>>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, as the identity subsystem would.
    pub fn add_user(&self, id: UserId, user_type: impl Into<String>) -> Result<(), PersistenceError> {
        let mut state = self.state.write().map_err(|_| PersistenceError::LockPoisoned)?;
        state.users.push(UserRecord {
            id,
            user_type: user_type.into(),
        });
        state.version += 1;
        Ok(())
    }

    /// Grant a role to a user outside reconciliation (operator action).
    pub fn grant_role(&self, user: UserId, role_name: &str) -> Result<(), PersistenceError> {
        let mut state = self.state.write().map_err(|_| PersistenceError::LockPoisoned)?;
        let role = state
            .role_by_name(role_name)
            .map(|r| r.id)
            .ok_or_else(|| PersistenceError::Database(format!("no role named '{role_name}'")))?;
        state.user_roles.insert((user, role));
        state.version += 1;
        Ok(())
    }

    /// Bind a permission to a role outside reconciliation.
    pub fn bind_permission(&self, role_name: &str, permission: Permission) -> Result<(), PersistenceError> {
        let mut state = self.state.write().map_err(|_| PersistenceError::LockPoisoned)?;
        let role = state
            .role_by_name(role_name)
            .map(|r| r.id)
            .ok_or_else(|| PersistenceError::Database(format!("no role named '{role_name}'")))?;
        let perm = state
            .permissions
            .iter()
            .find(|p| p.permission == permission)
            .map(|p| p.id)
            .ok_or_else(|| PersistenceError::Database(format!("no permission '{permission}'")))?;
        state.role_permissions.insert((role, perm));
        state.version += 1;
        Ok(())
    }

    /// A readable, id-free view of the committed state.
    pub fn snapshot(&self) -> Result<RbacSnapshot, PersistenceError> {
        let state = self.state.read().map_err(|_| PersistenceError::LockPoisoned)?;

        let permissions = state.permissions.iter().map(|p| p.permission.to_string()).collect();
        let roles = state.roles.iter().map(|r| r.name.clone()).collect();
        let role_permissions = state
            .role_permissions
            .iter()
            .filter_map(|(role, perm)| {
                Some((state.role_name(*role)?.to_string(), state.permission(*perm)?.permission.to_string()))
            })
            .collect();
        let user_roles = state
            .user_roles
            .iter()
            .filter_map(|(user, role)| Some((*user, state.role_name(*role)?.to_string())))
            .collect();

        Ok(RbacSnapshot {
            permission_rows: state.permissions.len(),
            role_rows: state.roles.len(),
            permissions,
            roles,
            role_permissions,
            user_roles,
        })
    }

    /// Committed permission and role rows, for inspecting stored fields.
    pub fn rows(&self) -> Result<(Vec<PermissionRecord>, Vec<RoleRecord>), PersistenceError> {
        let state = self.state.read().map_err(|_| PersistenceError::LockPoisoned)?;
        Ok((state.permissions.clone(), state.roles.clone()))
    }
}

/// Committed RBAC state with surrogate ids resolved to natural keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacSnapshot {
    /// Raw row counts, to detect duplicates the sets below would hide.
    pub permission_rows: usize,
    pub role_rows: usize,
    pub permissions: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    /// `(role name, "action:resource")`.
    pub role_permissions: BTreeSet<(String, String)>,
    pub user_roles: BTreeSet<(UserId, String)>,
}

impl RbacSnapshot {
    pub fn has_binding(&self, role: &str, permission: &str) -> bool {
        self.role_permissions
            .contains(&(role.to_string(), permission.to_string()))
    }

    pub fn roles_of(&self, user: UserId) -> BTreeSet<String> {
        self.user_roles
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

/// Transaction over an [`InMemoryRbacStore`].
#[derive(Debug)]
pub struct InMemoryRbacTransaction {
    shared: Arc<RwLock<RbacState>>,
    working: RbacState,
    /// Store version the working copy was taken from.
    base_version: u64,
}

#[async_trait::async_trait]
impl RbacTransaction for InMemoryRbacTransaction {
    async fn find_permission(
        &mut self,
        permission: Permission,
    ) -> Result<Option<PermissionRecord>, PersistenceError> {
        Ok(self
            .working
            .permissions
            .iter()
            .find(|p| p.permission == permission)
            .cloned())
    }

    async fn insert_permission(
        &mut self,
        spec: &PermissionSpec,
    ) -> Result<PermissionRecord, PersistenceError> {
        let permission = spec.permission();
        if self.working.permissions.iter().any(|p| p.permission == permission) {
            return Err(PersistenceError::Conflict(format!(
                "permission '{permission}' already exists"
            )));
        }

        let record = PermissionRecord {
            id: PermissionId::new(),
            permission,
            description: spec.description.clone(),
        };
        self.working.permissions.push(record.clone());
        Ok(record)
    }

    async fn find_role(&mut self, name: &str) -> Result<Option<RoleRecord>, PersistenceError> {
        Ok(self.working.role_by_name(name).cloned())
    }

    async fn insert_role(&mut self, spec: &RoleSpec) -> Result<RoleRecord, PersistenceError> {
        if self.working.role_by_name(spec.name.as_str()).is_some() {
            return Err(PersistenceError::Conflict(format!(
                "role '{}' already exists",
                spec.name
            )));
        }

        let record = RoleRecord {
            id: RoleId::new(),
            name: spec.name.to_string(),
            description: spec.description.clone(),
            is_system_role: spec.is_system_role,
        };
        self.working.roles.push(record.clone());
        Ok(record)
    }

    async fn clear_role_permissions(&mut self, role: RoleId) -> Result<u64, PersistenceError> {
        let before = self.working.role_permissions.len();
        self.working.role_permissions.retain(|(r, _)| *r != role);
        Ok((before - self.working.role_permissions.len()) as u64)
    }

    async fn insert_role_permission(
        &mut self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), PersistenceError> {
        self.working.role_permissions.insert((role, permission));
        Ok(())
    }

    async fn list_users(&mut self) -> Result<Vec<UserRecord>, PersistenceError> {
        Ok(self.working.users.clone())
    }

    async fn has_user_role(&mut self, user: UserId, role: RoleId) -> Result<bool, PersistenceError> {
        Ok(self.working.user_roles.contains(&(user, role)))
    }

    async fn insert_user_role(&mut self, user: UserId, role: RoleId) -> Result<(), PersistenceError> {
        self.working.user_roles.insert((user, role));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), PersistenceError> {
        let mut shared = self.shared.write().map_err(|_| PersistenceError::LockPoisoned)?;
        if shared.version != self.base_version {
            return Err(PersistenceError::Conflict(format!(
                "store changed since transaction began (version {} -> {})",
                self.base_version, shared.version
            )));
        }
        self.working.version = self.base_version + 1;
        *shared = self.working;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RbacStore for InMemoryRbacStore {
    type Tx = InMemoryRbacTransaction;

    async fn begin(&self) -> Result<Self::Tx, PersistenceError> {
        let working = self
            .state
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?
            .clone();
        Ok(InMemoryRbacTransaction {
            shared: self.state.clone(),
            base_version: working.version,
            working,
        })
    }

    async fn roles_for_user(&self, user: UserId) -> Result<Vec<String>, PersistenceError> {
        let state = self.state.read().map_err(|_| PersistenceError::LockPoisoned)?;
        Ok(state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user)
            .filter_map(|(_, role)| state.role_name(*role).map(str::to_string))
            .collect())
    }

    async fn role_grants(&self) -> Result<Vec<GrantRow>, PersistenceError> {
        let state = self.state.read().map_err(|_| PersistenceError::LockPoisoned)?;
        Ok(state
            .role_permissions
            .iter()
            .filter_map(|(role, perm)| {
                let role = state.role_name(*role)?;
                let perm = state.permission(*perm)?;
                Some(GrantRow {
                    role: role.to_string(),
                    action: perm.permission.action.to_string(),
                    resource: perm.permission.resource.to_string(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniserp_auth::{Action, Resource, RoleName};

    fn lecturer() -> RoleSpec {
        RoleSpec {
            name: RoleName::Lecturer,
            description: "Teaching staff".to_string(),
            is_system_role: true,
            permissions: vec![],
        }
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryRbacStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_role(&lecturer()).await.unwrap();
        }
        assert_eq!(store.snapshot().unwrap().role_rows, 0);
    }

    #[tokio::test]
    async fn commit_fails_when_store_changed_after_begin() {
        let store = InMemoryRbacStore::new();
        let user = UserId::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_role(&lecturer()).await.unwrap();
        store.add_user(user, "lecturer").unwrap();

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.role_rows, 0);
        let users = store.begin().await.unwrap().list_users().await.unwrap();
        assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![user]);
    }

    #[tokio::test]
    async fn second_of_two_overlapping_transactions_conflicts() {
        let store = InMemoryRbacStore::new();
        let spec = PermissionSpec::new(Action::View, Resource::Courses, "View courses");

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_permission(&spec).await.unwrap();
        second.insert_permission(&spec).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(PersistenceError::Conflict(_))));
        assert_eq!(store.snapshot().unwrap().permission_rows, 1);
    }

    #[tokio::test]
    async fn sequential_transactions_commit() {
        let store = InMemoryRbacStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_role(&lecturer()).await.unwrap();
        tx.commit().await.unwrap();

        store.add_user(UserId::new(), "lecturer").unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_role("lecturer").await.unwrap().is_some());
        tx.commit().await.unwrap();
    }
}
