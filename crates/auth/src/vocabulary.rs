//! Closed vocabulary of actions, resources and role names.
//!
//! Every token the authorization core understands is enumerated here, so a
//! typo in a catalog is a compile error (or a parse error for operator-supplied
//! catalogs) instead of a silently missing binding.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A token did not belong to the expected vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct VocabularyError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $token:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $token)] $variant,)+
        }

        impl $name {
            /// Every member of the vocabulary, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Canonical lowercase token.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = VocabularyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    _ => Err(VocabularyError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary! {
    /// Verb half of a permission.
    Action, "action" {
        View => "view",
        Create => "create",
        Update => "update",
        Delete => "delete",
        Approve => "approve",
        Process => "process",
        Assign => "assign",
    }
}

vocabulary! {
    /// Record family a permission applies to.
    Resource, "resource" {
        Users => "users",
        Roles => "roles",
        Courses => "courses",
        Results => "results",
        Transcripts => "transcripts",
        Payments => "payments",
        Attendance => "attendance",
        /// Student accommodation.
        Hostels => "hostels",
        Reports => "reports",
    }
}

vocabulary! {
    /// Name of a provisioned role.
    ///
    /// A user's `user_type` is matched against these tokens when default roles
    /// are assigned during reconciliation.
    RoleName, "role" {
        Admin => "admin",
        Registrar => "registrar",
        Bursar => "bursar",
        Dean => "dean",
        /// Head of department.
        Hod => "hod",
        Lecturer => "lecturer",
        Student => "student",
    }
}

impl RoleName {
    /// Whether this role bypasses every permission check.
    pub const fn is_superuser(&self) -> bool {
        matches!(self, RoleName::Admin)
    }
}
