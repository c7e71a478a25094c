//! Postgres-backed RBAC store.
//!
//! Schema lives in `sql/rbac.sql`. Natural keys are unique in the schema
//! (`permissions(action, resource)`, `roles(name)`), and binding tables use
//! composite primary keys, so repeated inserts are rejected by the database
//! rather than silently duplicated.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | PersistenceError |
//! |------------|-----------------|------------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / Io / other | N/A | `Database` |
//! | row decode failure | N/A | `Decode` |
//!
//! ## Concurrency
//!
//! [`PostgresRbacStore::begin`] takes a transaction-scoped advisory lock, so
//! two reconciliation runs against the same database serialize instead of
//! racing on the find-or-create steps.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use uniserp_auth::{Action, Permission, PermissionSpec, Resource, RoleSpec};
use uniserp_core::{PermissionId, RoleId, UserId};

use super::r#trait::{
    GrantRow, PermissionRecord, PersistenceError, RbacStore, RbacTransaction, RoleRecord,
    UserRecord,
};

/// Advisory lock key held for the lifetime of an RBAC write transaction.
const RBAC_LOCK_KEY: i64 = 0x7262_6163_7379_6e63;

#[derive(Debug, Clone)]
pub struct PostgresRbacStore {
    pool: Arc<PgPool>,
}

impl PostgresRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// An open RBAC write transaction. Dropping it without `commit` rolls back.
pub struct PostgresRbacTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresRbacTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRbacTransaction").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RbacTransaction for PostgresRbacTransaction {
    async fn find_permission(
        &mut self,
        permission: Permission,
    ) -> Result<Option<PermissionRecord>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT id, action, resource, description
            FROM permissions
            WHERE action = $1 AND resource = $2
            "#,
        )
        .bind(permission.action.as_str())
        .bind(permission.resource.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_permission", e))?;

        row.as_ref().map(permission_from_row).transpose()
    }

    async fn insert_permission(
        &mut self,
        spec: &PermissionSpec,
    ) -> Result<PermissionRecord, PersistenceError> {
        let record = PermissionRecord {
            id: PermissionId::new(),
            permission: spec.permission(),
            description: spec.description.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO permissions (id, action, resource, description)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.permission.action.as_str())
        .bind(record.permission.resource.as_str())
        .bind(&record.description)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_permission", e))?;

        Ok(record)
    }

    async fn find_role(&mut self, name: &str) -> Result<Option<RoleRecord>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, is_system_role
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_role", e))?;

        row.as_ref().map(role_from_row).transpose()
    }

    async fn insert_role(&mut self, spec: &RoleSpec) -> Result<RoleRecord, PersistenceError> {
        let record = RoleRecord {
            id: RoleId::new(),
            name: spec.name.to_string(),
            description: spec.description.clone(),
            is_system_role: spec.is_system_role,
        };

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, is_system_role)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.is_system_role)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;

        Ok(record)
    }

    async fn clear_role_permissions(&mut self, role: RoleId) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("clear_role_permissions", e))?;

        Ok(result.rows_affected())
    }

    async fn insert_role_permission(
        &mut self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role.as_uuid())
        .bind(permission.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_role_permission", e))?;

        Ok(())
    }

    async fn list_users(&mut self) -> Result<Vec<UserRecord>, PersistenceError> {
        let rows = sqlx::query("SELECT id, user_type FROM users ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter()
            .map(|row| {
                Ok(UserRecord {
                    id: UserId::from_uuid(decode(row, "id")?),
                    user_type: decode(row, "user_type")?,
                })
            })
            .collect()
    }

    async fn has_user_role(&mut self, user: UserId, role: RoleId) -> Result<bool, PersistenceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role_id = $2)",
        )
        .bind(user.as_uuid())
        .bind(role.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("has_user_role", e))?;

        Ok(exists)
    }

    async fn insert_user_role(&mut self, user: UserId, role: RoleId) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.as_uuid())
        .bind(role.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user_role", e))?;

        Ok(())
    }

    async fn commit(self) -> Result<(), PersistenceError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait::async_trait]
impl RbacStore for PostgresRbacStore {
    type Tx = PostgresRbacTransaction;

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Self::Tx, PersistenceError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(RBAC_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;

        Ok(PostgresRbacTransaction { tx })
    }

    #[instrument(skip(self), fields(user_id = %user.as_uuid()), err)]
    async fn roles_for_user(&self, user: UserId) -> Result<Vec<String>, PersistenceError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_for_user", e))?;

        Ok(names)
    }

    #[instrument(skip(self), err)]
    async fn role_grants(&self) -> Result<Vec<GrantRow>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT r.name AS role, p.action, p.resource
            FROM role_permissions rp
            JOIN roles r ON r.id = rp.role_id
            JOIN permissions p ON p.id = rp.permission_id
            ORDER BY r.name, p.resource, p.action
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_grants", e))?;

        rows.iter()
            .map(|row| {
                Ok(GrantRow {
                    role: decode(row, "role")?,
                    action: decode(row, "action")?,
                    resource: decode(row, "resource")?,
                })
            })
            .collect()
    }
}

fn decode<'r, T>(row: &'r PgRow, column: &str) -> Result<T, PersistenceError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| PersistenceError::Decode(format!("column '{column}': {e}")))
}

fn permission_from_row(row: &PgRow) -> Result<PermissionRecord, PersistenceError> {
    let id: Uuid = decode(row, "id")?;
    let action: String = decode(row, "action")?;
    let resource: String = decode(row, "resource")?;

    let action = Action::from_str(&action).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    let resource =
        Resource::from_str(&resource).map_err(|e| PersistenceError::Decode(e.to_string()))?;

    Ok(PermissionRecord {
        id: PermissionId::from_uuid(id),
        permission: Permission::new(action, resource),
        description: decode(row, "description")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<RoleRecord, PersistenceError> {
    Ok(RoleRecord {
        id: RoleId::from_uuid(decode(row, "id")?),
        name: decode(row, "name")?,
        description: decode(row, "description")?,
        is_system_role: decode(row, "is_system_role")?,
    })
}

/// Map SQLx errors to `PersistenceError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => PersistenceError::Conflict(msg),
                _ => PersistenceError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            PersistenceError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            PersistenceError::Decode(format!("in {}: {}", operation, err))
        }
        _ => PersistenceError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}
