//! Permission and role catalogs: the declared source of truth that
//! reconciliation provisions into storage.
//!
//! A catalog is plain, immutable data. It is built once at startup (either the
//! built-in [`Catalog::university`] seed or an operator-supplied JSON file) and
//! handed explicitly to whoever needs it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permissions::Permission;
use crate::vocabulary::{Action, Resource, RoleName};

/// One entry of the permission catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub action: Action,
    pub resource: Resource,
    pub description: String,
}

impl PermissionSpec {
    pub fn new(action: Action, resource: Resource, description: impl Into<String>) -> Self {
        Self {
            action,
            resource,
            description: description.into(),
        }
    }

    pub fn permission(&self) -> Permission {
        Permission::new(self.action, self.resource)
    }
}

/// One entry of the role catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: RoleName,
    pub description: String,
    /// Advisory: system roles are expected to always exist and should not be
    /// deleted by operators. Nothing in this core enforces it.
    #[serde(default)]
    pub is_system_role: bool,
    /// Permissions granted by this role, referenced as `action:resource`.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("permission '{0}' is declared more than once")]
    DuplicatePermission(Permission),

    #[error("role '{0}' is declared more than once")]
    DuplicateRole(RoleName),

    #[error("role '{role}' references permission '{permission}' which is not in the permission catalog")]
    UnresolvedReference { role: RoleName, permission: Permission },

    #[error("catalog could not be parsed: {0}")]
    Parse(String),
}

/// The permission catalog plus the role catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub permissions: Vec<PermissionSpec>,
    pub roles: Vec<RoleSpec>,
}

impl Catalog {
    /// Build a catalog and validate it.
    pub fn new(permissions: Vec<PermissionSpec>, roles: Vec<RoleSpec>) -> Result<Self, CatalogError> {
        let catalog = Self { permissions, roles };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse an operator-supplied catalog from JSON, then validate it.
    ///
    /// Unknown action/resource/role tokens are rejected at parse time.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            serde_json::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn role(&self, name: RoleName) -> Option<&RoleSpec> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn contains_permission(&self, permission: Permission) -> bool {
        self.permissions.iter().any(|p| p.permission() == permission)
    }

    /// Reject duplicate permission pairs and duplicate role names.
    pub fn check_unique(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for spec in &self.permissions {
            if !seen.insert(spec.permission()) {
                return Err(CatalogError::DuplicatePermission(spec.permission()));
            }
        }

        let mut names = HashSet::new();
        for role in &self.roles {
            if !names.insert(role.name) {
                return Err(CatalogError::DuplicateRole(role.name));
            }
        }

        Ok(())
    }

    /// Every `(role, permission)` reference that does not resolve to a
    /// permission catalog entry.
    pub fn unresolved_references(&self) -> Vec<(RoleName, Permission)> {
        let declared: HashSet<Permission> =
            self.permissions.iter().map(PermissionSpec::permission).collect();

        self.roles
            .iter()
            .flat_map(|role| {
                role.permissions
                    .iter()
                    .filter(|p| !declared.contains(p))
                    .map(move |p| (role.name, *p))
            })
            .collect()
    }

    /// Full validation: uniqueness, then referential integrity.
    pub fn validate(&self) -> Result<(), CatalogError> {
        self.check_unique()?;
        match self.unresolved_references().into_iter().next() {
            Some((role, permission)) => Err(CatalogError::UnresolvedReference { role, permission }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_users() -> PermissionSpec {
        PermissionSpec::new(Action::View, Resource::Users, "View users")
    }

    fn role(name: RoleName, permissions: Vec<Permission>) -> RoleSpec {
        RoleSpec {
            name,
            description: name.to_string(),
            is_system_role: true,
            permissions,
        }
    }

    #[test]
    fn duplicate_permission_pairs_are_rejected() {
        let err = Catalog::new(vec![view_users(), view_users()], vec![]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicatePermission(Permission::new(Action::View, Resource::Users))
        );
    }

    #[test]
    fn duplicate_role_names_are_rejected() {
        let err = Catalog::new(
            vec![view_users()],
            vec![role(RoleName::Dean, vec![]), role(RoleName::Dean, vec![])],
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateRole(RoleName::Dean));
    }

    #[test]
    fn dangling_role_permission_is_an_error() {
        let missing = Permission::new(Action::Delete, Resource::Users);
        let catalog = Catalog {
            permissions: vec![view_users()],
            roles: vec![role(
                RoleName::Registrar,
                vec![Permission::new(Action::View, Resource::Users), missing],
            )],
        };

        assert_eq!(catalog.unresolved_references(), vec![(RoleName::Registrar, missing)]);
        assert_eq!(
            catalog.validate().unwrap_err(),
            CatalogError::UnresolvedReference {
                role: RoleName::Registrar,
                permission: missing,
            }
        );
    }

    #[test]
    fn json_catalog_is_parsed_and_validated() {
        let raw = r#"{
            "permissions": [
                { "action": "view", "resource": "courses", "description": "View courses" }
            ],
            "roles": [
                { "name": "student", "description": "Student", "is_system_role": true,
                  "permissions": ["view:courses"] },
                { "name": "lecturer", "description": "Lecturer" }
            ]
        }"#;

        let catalog = Catalog::from_json(raw).unwrap();
        assert_eq!(catalog.roles.len(), 2);
        assert!(!catalog.role(RoleName::Lecturer).unwrap().is_system_role);
        assert_eq!(
            catalog.role(RoleName::Student).unwrap().permissions,
            vec![Permission::new(Action::View, Resource::Courses)]
        );
    }

    #[test]
    fn json_catalog_with_typo_fails_to_parse() {
        let raw = r#"{
            "permissions": [],
            "roles": [{ "name": "student", "description": "", "permissions": ["veiw:courses"] }]
        }"#;

        assert!(matches!(Catalog::from_json(raw), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn json_catalog_with_unlisted_reference_fails_validation() {
        let raw = r#"{
            "permissions": [],
            "roles": [{ "name": "student", "description": "", "permissions": ["view:courses"] }]
        }"#;

        assert!(matches!(
            Catalog::from_json(raw),
            Err(CatalogError::UnresolvedReference { role: RoleName::Student, .. })
        ));
    }
}
