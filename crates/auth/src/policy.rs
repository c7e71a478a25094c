//! Runtime authorization evaluator.
//!
//! An [`AccessPolicy`] answers allow/deny for `(roles, action, resource)`. It is
//! built from role→permission grants (the seeded catalog, or the persisted
//! role/permission graph) so there is exactly one description of what each role
//! may do.
//!
//! - No IO
//! - No panics
//! - Pure function of its inputs; safe to share across threads

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::catalog::Catalog;
use crate::permissions::Permission;
use crate::roles::RoleSet;
use crate::vocabulary::{Action, Resource, RoleName};

/// Why a check was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum Grant {
    /// The caller holds `admin`, which bypasses every check.
    AdminBypass,
    /// The named role grants the requested pair.
    Role(RoleName),
}

/// Why a check was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Denial {
    /// The caller holds no (recognised) roles.
    NoRoles,
    /// The requested action is not part of the vocabulary.
    UnknownAction(String),
    /// The requested resource is not part of the vocabulary.
    UnknownResource(String),
    /// None of the caller's roles grants the requested pair.
    MissingPermission(Permission),
}

/// Outcome of an authorization check.
///
/// Denial is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allowed(Grant),
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// Role → granted permissions, evaluated with admin bypass and default deny.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    grants: HashMap<RoleName, HashSet<Permission>>,
}

impl AccessPolicy {
    /// Build a policy from `(role, permission)` grant pairs.
    pub fn from_grants<I>(grants: I) -> Self
    where
        I: IntoIterator<Item = (RoleName, Permission)>,
    {
        let mut map: HashMap<RoleName, HashSet<Permission>> = HashMap::new();
        for (role, permission) in grants {
            map.entry(role).or_default().insert(permission);
        }
        Self { grants: map }
    }

    /// Build a policy from the role catalog's declared permissions.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::from_grants(
            catalog
                .roles
                .iter()
                .flat_map(|role| role.permissions.iter().map(move |p| (role.name, *p))),
        )
    }

    /// Permissions explicitly granted to `role`, sorted.
    pub fn permissions_for(&self, role: RoleName) -> BTreeSet<Permission> {
        self.grants
            .get(&role)
            .map(|perms| perms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Typed check for a well-formed permission.
    pub fn permits(&self, roles: &RoleSet, permission: Permission) -> bool {
        self.decide(roles, permission).is_allowed()
    }

    /// Boolean form of [`AccessPolicy::evaluate`].
    pub fn is_allowed(&self, roles: &RoleSet, action: &str, resource: &str) -> bool {
        self.evaluate(roles, action, resource).is_allowed()
    }

    /// Evaluate a request coming from the outside world as raw tokens.
    ///
    /// Malformed tokens (including empty strings) are a denial, never an error,
    /// except for `admin` callers who are allowed unconditionally.
    pub fn evaluate(&self, roles: &RoleSet, action: &str, resource: &str) -> Decision {
        if roles.contains(RoleName::Admin) {
            return Decision::Allowed(Grant::AdminBypass);
        }
        if roles.is_empty() {
            return Decision::Denied(Denial::NoRoles);
        }

        let Ok(action) = action.parse::<Action>() else {
            return Decision::Denied(Denial::UnknownAction(action.to_string()));
        };
        let Ok(resource) = resource.parse::<Resource>() else {
            return Decision::Denied(Denial::UnknownResource(resource.to_string()));
        };

        self.decide(roles, Permission::new(action, resource))
    }

    fn decide(&self, roles: &RoleSet, permission: Permission) -> Decision {
        if roles.contains(RoleName::Admin) {
            return Decision::Allowed(Grant::AdminBypass);
        }
        if roles.is_empty() {
            return Decision::Denied(Denial::NoRoles);
        }

        roles
            .iter()
            .find(|role| {
                self.grants
                    .get(role)
                    .is_some_and(|perms| perms.contains(&permission))
            })
            .map(|role| Decision::Allowed(Grant::Role(role)))
            .unwrap_or(Decision::Denied(Denial::MissingPermission(permission)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seeded() -> AccessPolicy {
        AccessPolicy::from_catalog(&Catalog::university())
    }

    fn roles(names: &[&str]) -> RoleSet {
        RoleSet::from_names(names)
    }

    /// The request-time access matrix, written out independently of the seed
    /// catalog so that drift between the two is caught.
    const MATRIX: &[(&str, &str, &[&str])] = &[
        ("registrar", "users", &["view", "create", "update"]),
        ("registrar", "transcripts", &["view", "create", "update", "process"]),
        ("registrar", "courses", &["view"]),
        ("bursar", "users", &["view"]),
        ("bursar", "payments", &["view", "create", "update"]),
        ("dean", "users", &["view", "update"]),
        ("dean", "courses", &["view", "create", "update"]),
        ("dean", "results", &["view", "approve"]),
        ("hod", "users", &["view", "update"]),
        ("hod", "courses", &["view", "create", "update"]),
        ("hod", "results", &["view", "approve"]),
        ("lecturer", "courses", &["view"]),
        ("lecturer", "results", &["view", "create", "update"]),
        ("lecturer", "attendance", &["view", "create", "update"]),
        ("student", "courses", &["view"]),
        ("student", "payments", &["view"]),
        ("student", "results", &["view"]),
    ];

    fn matrix_allows(role: &str, action: &str, resource: &str) -> bool {
        MATRIX
            .iter()
            .any(|(r, res, actions)| *r == role && *res == resource && actions.contains(&action))
    }

    #[test]
    fn seeded_policy_matches_matrix_for_every_cell() {
        let policy = seeded();
        for role in RoleName::ALL.iter().filter(|r| !r.is_superuser()) {
            for action in Action::ALL {
                for resource in Resource::ALL {
                    assert_eq!(
                        policy.is_allowed(&RoleSet::from([*role]), action.as_str(), resource.as_str()),
                        matrix_allows(role.as_str(), action.as_str(), resource.as_str()),
                        "{role} {action}:{resource}"
                    );
                }
            }
        }
    }

    #[test]
    fn table_fidelity_cases() {
        let policy = seeded();
        assert!(policy.is_allowed(&roles(&["registrar"]), "create", "users"));
        assert!(!policy.is_allowed(&roles(&["registrar"]), "delete", "users"));
        assert!(policy.is_allowed(&roles(&["bursar"]), "view", "payments"));
        assert!(policy.is_allowed(&roles(&["lecturer"]), "create", "attendance"));
        assert!(policy.is_allowed(&roles(&["student"]), "view", "results"));
        assert!(!policy.is_allowed(&roles(&["student"]), "create", "results"));
    }

    #[test]
    fn student_cannot_delete_users() {
        assert_eq!(
            seeded().evaluate(&roles(&["student"]), "delete", "users"),
            Decision::Denied(Denial::MissingPermission(Permission::new(Action::Delete, Resource::Users)))
        );
    }

    #[test]
    fn empty_role_set_is_denied() {
        assert_eq!(
            seeded().evaluate(&RoleSet::new(), "view", "dashboard"),
            Decision::Denied(Denial::NoRoles)
        );
    }

    #[test]
    fn admin_bypasses_unknown_tokens() {
        let decision = seeded().evaluate(&roles(&["admin"]), "launch-nuke", "missiles");
        assert_eq!(decision, Decision::Allowed(Grant::AdminBypass));
    }

    #[test]
    fn admin_bypass_does_not_depend_on_grants() {
        let empty = AccessPolicy::default();
        assert!(empty.is_allowed(&roles(&["admin"]), "delete", "hostels"));
        assert!(!empty.is_allowed(&roles(&["dean"]), "view", "users"));
    }

    #[test]
    fn malformed_tokens_are_denied() {
        let policy = seeded();
        let lecturer = roles(&["lecturer"]);
        assert_eq!(
            policy.evaluate(&lecturer, "", "results"),
            Decision::Denied(Denial::UnknownAction(String::new()))
        );
        assert_eq!(
            policy.evaluate(&lecturer, "view", ""),
            Decision::Denied(Denial::UnknownResource(String::new()))
        );
        assert!(!policy.is_allowed(&lecturer, "VIEW", "results"));
    }

    #[test]
    fn any_held_role_may_grant() {
        let policy = seeded();
        let both = roles(&["student", "lecturer"]);
        assert_eq!(
            policy.evaluate(&both, "create", "results"),
            Decision::Allowed(Grant::Role(RoleName::Lecturer))
        );
        assert!(policy.is_allowed(&both, "view", "payments"));
    }

    #[test]
    fn unknown_role_names_grant_nothing() {
        assert_eq!(
            seeded().evaluate(&roles(&["superuser"]), "view", "courses"),
            Decision::Denied(Denial::NoRoles)
        );
    }

    #[test]
    fn policy_from_grants_reflects_persisted_bindings() {
        let view_hostels = Permission::new(Action::View, Resource::Hostels);
        let policy = AccessPolicy::from_grants([(RoleName::Student, view_hostels)]);

        assert!(policy.permits(&RoleSet::from([RoleName::Student]), view_hostels));
        assert!(!policy.is_allowed(&roles(&["student"]), "view", "results"));
        assert_eq!(policy.permissions_for(RoleName::Student).len(), 1);
        assert!(policy.permissions_for(RoleName::Bursar).is_empty());
    }

    #[test]
    fn decision_serializes_with_reason() {
        let json = serde_json::to_value(Decision::Allowed(Grant::Role(RoleName::Dean))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "decision": "allowed", "reason": { "kind": "role", "role": "dean" } })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any role set containing admin is allowed for any input.
        #[test]
        fn admin_is_allowed_everything(
            action in ".*",
            resource in ".*",
            others in prop::collection::vec(prop::sample::select(RoleName::ALL.to_vec()), 0..4),
        ) {
            let mut held: RoleSet = others.into_iter().collect();
            held.insert(RoleName::Admin);
            prop_assert!(seeded().is_allowed(&held, &action, &resource));
        }

        /// Property: tokens outside the vocabulary are denied for non-admin callers.
        #[test]
        fn unknown_pairs_are_denied(
            action in "[a-z-]{1,12}",
            resource in "[a-z-]{1,12}",
            role in prop::sample::select(RoleName::ALL[1..].to_vec()),
        ) {
            prop_assume!(action.parse::<Action>().is_err() || resource.parse::<Resource>().is_err());
            prop_assert!(!seeded().is_allowed(&RoleSet::from([role]), &action, &resource));
        }
    }
}
