use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use uniserp_core::ValueObject;

use crate::vocabulary::{Action, Resource, VocabularyError};

/// Permission identifier: an `(action, resource)` pair.
///
/// The pair is the natural key of a permission. Its textual form is
/// `action:resource` (e.g. `update:results`), which is also how role catalogs
/// reference permissions and how the pair is serialized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    pub action: Action,
    pub resource: Resource,
}

impl Permission {
    pub const fn new(action: Action, resource: Resource) -> Self {
        Self { action, resource }
    }
}

impl ValueObject for Permission {}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.action, self.resource)
    }
}

/// A permission reference could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionParseError {
    #[error("malformed permission reference '{0}' (expected 'action:resource')")]
    Malformed(String),

    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, resource) = s
            .split_once(':')
            .ok_or_else(|| PermissionParseError::Malformed(s.to_string()))?;
        if resource.contains(':') {
            return Err(PermissionParseError::Malformed(s.to_string()));
        }

        Ok(Self {
            action: action.parse()?,
            resource: resource.parse()?,
        })
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}
