use serde::{Deserialize, Serialize};
use thiserror::Error;

use uniserp_auth::{Permission, PermissionSpec, RoleSpec};
use uniserp_core::{Entity, PermissionId, RoleId, UserId};

/// A persisted permission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub permission: Permission,
    pub description: String,
}

impl Entity for PermissionRecord {
    type Id = PermissionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A persisted role row.
///
/// `name` is kept as stored: rows created outside reconciliation may carry
/// names the role vocabulary does not know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub is_system_role: bool,
}

impl Entity for RoleRecord {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// The slice of a user record this core needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Classifier matched against role names when assigning default roles.
    pub user_type: String,
}

impl Entity for UserRecord {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One persisted role→permission binding, as raw stored tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRow {
    pub role: String,
    pub action: String,
    pub resource: String,
}

/// Persistence operation error.
///
/// These are infrastructure errors; any of them aborts a reconciliation run.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("unreadable row: {0}")]
    Decode(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

/// A unit of work against the RBAC tables.
///
/// Writes become visible to other readers only after [`RbacTransaction::commit`];
/// dropping the transaction discards them.
#[async_trait::async_trait]
pub trait RbacTransaction: Send {
    /// Look up a permission by its natural key.
    async fn find_permission(
        &mut self,
        permission: Permission,
    ) -> Result<Option<PermissionRecord>, PersistenceError>;

    async fn insert_permission(
        &mut self,
        spec: &PermissionSpec,
    ) -> Result<PermissionRecord, PersistenceError>;

    async fn find_role(&mut self, name: &str) -> Result<Option<RoleRecord>, PersistenceError>;

    async fn insert_role(&mut self, spec: &RoleSpec) -> Result<RoleRecord, PersistenceError>;

    /// Delete every binding of `role`, returning how many were removed.
    async fn clear_role_permissions(&mut self, role: RoleId) -> Result<u64, PersistenceError>;

    /// Bind a permission to a role. Binding an existing pair is a no-op.
    async fn insert_role_permission(
        &mut self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), PersistenceError>;

    async fn list_users(&mut self) -> Result<Vec<UserRecord>, PersistenceError>;

    async fn has_user_role(&mut self, user: UserId, role: RoleId) -> Result<bool, PersistenceError>;

    /// Bind a role to a user. Binding an existing pair is a no-op.
    async fn insert_user_role(&mut self, user: UserId, role: RoleId) -> Result<(), PersistenceError>;

    async fn commit(self) -> Result<(), PersistenceError>;
}

/// Storage boundary for roles, permissions and their bindings.
///
/// Works with in-memory implementations (tests/dev) and PostgreSQL.
#[async_trait::async_trait]
pub trait RbacStore: Send + Sync {
    type Tx: RbacTransaction;

    /// Open a unit of work.
    async fn begin(&self) -> Result<Self::Tx, PersistenceError>;

    /// Names of every role bound to `user` (UserRole joined with Role).
    async fn roles_for_user(&self, user: UserId) -> Result<Vec<String>, PersistenceError>;

    /// Every persisted role→permission binding.
    async fn role_grants(&self) -> Result<Vec<GrantRow>, PersistenceError>;
}

#[async_trait::async_trait]
impl<S> RbacStore for std::sync::Arc<S>
where
    S: RbacStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, PersistenceError> {
        (**self).begin().await
    }

    async fn roles_for_user(&self, user: UserId) -> Result<Vec<String>, PersistenceError> {
        (**self).roles_for_user(user).await
    }

    async fn role_grants(&self) -> Result<Vec<GrantRow>, PersistenceError> {
        (**self).role_grants().await
    }
}
