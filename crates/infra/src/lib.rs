//! Infrastructure layer: RBAC storage, reconciliation, request-time
//! authorization and configuration.

pub mod authorizer;
pub mod config;
pub mod reconcile;
pub mod store;

pub use authorizer::Authorizer;
pub use config::{ConfigError, ProvisionConfig};
pub use reconcile::{
    RbacReconciler, ReconcileError, ReconcileOptions, ReconcileReport, UnresolvedPermissionPolicy,
};
pub use store::{
    GrantRow, InMemoryRbacStore, PermissionRecord, PersistenceError, PostgresRbacStore, RbacStore,
    RbacTransaction, RoleRecord, UserRecord,
};
