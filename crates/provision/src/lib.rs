//! Deploy-time provisioning: reconcile the RBAC catalog into Postgres.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use uniserp_auth::Catalog;
use uniserp_infra::{PostgresRbacStore, ProvisionConfig, RbacReconciler, ReconcileReport};

/// Load the catalog to provision: the JSON file at `path`, or the built-in
/// university catalog.
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    let Some(path) = path else {
        tracing::info!("no catalog file configured; using built-in university catalog");
        return Ok(Catalog::university());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file {}", path.display()))?;
    let catalog = Catalog::from_json(&raw)
        .with_context(|| format!("invalid catalog file {}", path.display()))?;
    tracing::info!(path = %path.display(), "catalog loaded");
    Ok(catalog)
}

/// Connect, reconcile once, and return what changed.
pub async fn run(config: &ProvisionConfig) -> anyhow::Result<ReconcileReport> {
    let catalog = load_catalog(config.catalog_path.as_deref())?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let reconciler = RbacReconciler::new(PostgresRbacStore::new(pool), Arc::new(catalog))
        .with_options(config.reconcile_options());

    let report = reconciler.reconcile().await.context("reconciliation failed")?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_falls_back_to_builtin_catalog() {
        assert_eq!(load_catalog(None).unwrap(), Catalog::university());
    }

    #[test]
    fn catalog_file_round_trips_through_json() {
        let path = std::env::temp_dir().join(format!("uniserp-catalog-{}.json", std::process::id()));
        let json = serde_json::to_string_pretty(&Catalog::university()).unwrap();
        std::fs::write(&path, json).unwrap();

        let loaded = load_catalog(Some(&path));
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.unwrap(), Catalog::university());
    }

    #[test]
    fn unreadable_catalog_file_is_an_error() {
        let path = std::env::temp_dir().join("uniserp-catalog-does-not-exist.json");
        let err = load_catalog(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to read catalog file"));
    }
}
