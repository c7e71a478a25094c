//! Persistence boundary for the RBAC tables.
//!
//! The traits here make no storage assumptions; `in_memory` backs tests and
//! development, `postgres` backs deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryRbacStore, InMemoryRbacTransaction, RbacSnapshot};
pub use postgres::{PostgresRbacStore, PostgresRbacTransaction};
pub use r#trait::{
    GrantRow, PermissionRecord, PersistenceError, RbacStore, RbacTransaction, RoleRecord,
    UserRecord,
};
