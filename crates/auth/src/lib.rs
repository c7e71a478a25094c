//! `uniserp-auth`: role-based access control for the university ERP.
//!
//! This crate is intentionally decoupled from HTTP and storage: it holds the
//! closed vocabulary, the permission/role catalogs and the evaluator that
//! answers allow/deny for a caller's roles.

pub mod authorize;
pub mod catalog;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod university;
pub mod vocabulary;

pub use authorize::{authorize, authorize_command, check, AuthzError, CommandAuthorization};
pub use catalog::{Catalog, CatalogError, PermissionSpec, RoleSpec};
pub use permissions::{Permission, PermissionParseError};
pub use policy::{AccessPolicy, Decision, Denial, Grant};
pub use principal::{Caller, Principal};
pub use roles::RoleSet;
pub use vocabulary::{Action, Resource, RoleName, VocabularyError};
