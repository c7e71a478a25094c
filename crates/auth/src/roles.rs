use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use uniserp_core::ValueObject;

use crate::vocabulary::RoleName;

/// The roles a caller holds, as resolved for one request.
///
/// Ordered so that evaluation (and explanations) are deterministic. Names that
/// fall outside the role vocabulary are dropped on construction: a role the
/// core does not know about can grant nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<RoleName>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a role set from raw role names (e.g. as returned by storage).
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .filter_map(|n| n.as_ref().parse::<RoleName>().ok())
                .collect(),
        )
    }

    pub fn insert(&mut self, role: RoleName) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: RoleName) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = RoleName> + '_ {
        self.0.iter().copied()
    }
}

impl ValueObject for RoleSet {}

impl FromIterator<RoleName> for RoleSet {
    fn from_iter<T: IntoIterator<Item = RoleName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[RoleName; N]> for RoleSet {
    fn from(value: [RoleName; N]) -> Self {
        value.into_iter().collect()
    }
}
