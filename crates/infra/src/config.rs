//! Environment-driven configuration for the provisioning job.

use std::path::PathBuf;

use thiserror::Error;

use uniserp_observability::LogFormat;

use crate::reconcile::{ReconcileOptions, UnresolvedPermissionPolicy};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// JSON catalog to provision; the built-in university catalog when unset.
    pub catalog_path: Option<PathBuf>,
    pub unresolved: UnresolvedPermissionPolicy,
    pub log_format: LogFormat,
}

impl ProvisionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => return Err(invalid("DATABASE_MAX_CONNECTIONS", raw, "must be at least 1")),
                Err(e) => return Err(invalid("DATABASE_MAX_CONNECTIONS", raw, e)),
            },
        };

        let unresolved = match get("RBAC_UNRESOLVED_PERMISSIONS") {
            None => UnresolvedPermissionPolicy::default(),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "fail" => UnresolvedPermissionPolicy::Fail,
                "skip" => UnresolvedPermissionPolicy::Skip,
                _ => return Err(invalid("RBAC_UNRESOLVED_PERMISSIONS", raw, "expected 'fail' or 'skip'")),
            },
        };

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| invalid("LOG_FORMAT", raw.clone(), e))?,
        };

        Ok(Self {
            database_url,
            max_connections,
            catalog_path: get("RBAC_CATALOG_PATH").map(PathBuf::from),
            unresolved,
            log_format,
        })
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            unresolved: self.unresolved,
        }
    }
}

fn invalid(name: &'static str, value: String, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ProvisionConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProvisionConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/erp")]).unwrap();
        assert_eq!(cfg.database_url, "postgres://localhost/erp");
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.catalog_path, None);
        assert_eq!(cfg.unresolved, UnresolvedPermissionPolicy::Fail);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        assert_eq!(
            config(&[("DATABASE_URL", "  ")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://db/erp"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("RBAC_CATALOG_PATH", "/etc/uniserp/catalog.json"),
            ("RBAC_UNRESOLVED_PERMISSIONS", "Skip"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.max_connections, 12);
        assert_eq!(cfg.catalog_path, Some(PathBuf::from("/etc/uniserp/catalog.json")));
        assert_eq!(cfg.reconcile_options().unresolved, UnresolvedPermissionPolicy::Skip);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("RBAC_UNRESOLVED_PERMISSIONS", "ignore"),
            ("LOG_FORMAT", "xml"),
        ] {
            let err = config(&[("DATABASE_URL", "postgres://db/erp"), (key, value)]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { name, .. } if *name == key),
                "{key}={value} gave {err:?}"
            );
        }
    }
}
