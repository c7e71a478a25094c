use std::process::ExitCode;

use uniserp_infra::ProvisionConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ProvisionConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            uniserp_observability::init();
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    uniserp_observability::init_with(config.log_format);

    match uniserp_provision::run(&config).await {
        Ok(report) => {
            tracing::info!(
                permissions_inserted = report.permissions_inserted,
                roles_inserted = report.roles_inserted,
                bindings_inserted = report.bindings_inserted,
                bindings_removed = report.bindings_removed,
                user_roles_assigned = report.user_roles_assigned,
                users_unmatched = report.users_unmatched,
                skipped_references = report.skipped_references.len(),
                duration_ms = report.duration_ms(),
                "rbac provisioning complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "rbac provisioning failed");
            ExitCode::FAILURE
        }
    }
}
