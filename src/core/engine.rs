use crate::core::script::{bracket, substitute_server_name, summary_line};
use crate::domain::model::{
    MigrationReport, PoolOutcome, PoolStatus, SqlScript, MIN_MAJOR_VERSION,
};
use crate::domain::ports::{MigrationSettings, ServerSession};
use crate::utils::error::{MigrateError, Result};

/// Drives the whole migration: version gate, server-level settings, one
/// pool at a time with its workload groups, and the final reconfigure.
///
/// Error policy follows the shape of the workflow: the version gate is
/// fatal, everything after it is caught, logged and recorded so that one
/// broken pool never stops its siblings.
pub struct MigrationEngine<S: ServerSession, D: ServerSession, C: MigrationSettings> {
    source: S,
    destination: D,
    settings: C,
}

impl<S: ServerSession, D: ServerSession, C: MigrationSettings> MigrationEngine<S, D, C> {
    pub fn new(source: S, destination: D, settings: C) -> Self {
        Self {
            source,
            destination,
            settings,
        }
    }

    pub async fn run(&mut self) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(
            self.source.server_name(),
            self.destination.server_name(),
            self.settings.dry_run(),
        );

        self.check_support()?;

        report.settings_copied = self.copy_governor_settings().await;

        let pools = self.select_pools().await?;
        if pools.is_empty() {
            tracing::warn!("No resource pools selected for migration");
        }
        for pool in pools {
            let outcome = self.migrate_pool(&pool).await;
            report.pools.push(outcome);
        }

        report.reconfigured = self.reconfigure().await;
        report.finish();
        Ok(report)
    }

    /// Both servers must be at least SQL Server 2008; an unsupported
    /// destination edition is only worth a warning, since the metadata
    /// operations still work there.
    fn check_support(&self) -> Result<()> {
        for (role, properties) in [
            ("Source", self.source.properties()),
            ("Destination", self.destination.properties()),
        ] {
            if !properties.meets_version_floor() {
                return Err(MigrateError::UnsupportedServerError {
                    server: format!("{} {}", role.to_lowercase(), properties.name),
                    reason: format!(
                        "Resource Governor requires major version {} or later, found {} ({})",
                        MIN_MAJOR_VERSION, properties.major_version, properties.product_version
                    ),
                });
            }
            tracing::debug!(
                "{} {} is {} {}",
                role,
                properties.name,
                properties.edition,
                properties.product_version
            );
        }

        let destination = self.destination.properties();
        if !destination.supports_resource_governor() {
            tracing::warn!(
                "Destination edition '{}' does not enforce Resource Governor limits; \
                 configuration will be copied but stays inactive",
                destination.edition
            );
        }
        Ok(())
    }

    async fn copy_governor_settings(&mut self) -> bool {
        tracing::info!("Copying server-level Resource Governor settings");
        let script = match self.source.script_governor_settings().await {
            Ok(script) => script,
            Err(e) => {
                tracing::error!("Scripting Resource Governor settings failed: {}", e);
                return false;
            }
        };
        match self.apply_script(&script).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }

    /// The explicit include list wins when given; otherwise every pool
    /// except the reserved ones. The exclude list filters either way.
    async fn select_pools(&mut self) -> Result<Vec<String>> {
        let available = self.source.list_resource_pools().await?;

        let include = self.settings.include_pools();
        for wanted in include {
            if !available.iter().any(|p| p.eq_ignore_ascii_case(wanted)) {
                tracing::warn!("Requested pool [{}] does not exist on the source", wanted);
            }
        }

        let selected: Vec<String> = available
            .into_iter()
            .filter(|pool| {
                if self
                    .settings
                    .reserved_pools()
                    .iter()
                    .any(|r| r.eq_ignore_ascii_case(pool))
                {
                    return false;
                }
                if !include.is_empty() && !include.iter().any(|i| i.eq_ignore_ascii_case(pool)) {
                    return false;
                }
                !self
                    .settings
                    .exclude_pools()
                    .iter()
                    .any(|x| x.eq_ignore_ascii_case(pool))
            })
            .collect();

        tracing::info!("Selected {} resource pool(s) for migration", selected.len());
        Ok(selected)
    }

    async fn migrate_pool(&mut self, pool: &str) -> PoolOutcome {
        tracing::info!("Migrating resource pool [{}]", pool);

        match self.destination_has_pool(pool).await {
            Ok(true) if !self.settings.force() => {
                tracing::warn!(
                    "Pool [{}] already exists on {}; skipping (use --force to overwrite)",
                    pool,
                    self.destination.server_name()
                );
                return PoolOutcome::skipped(pool, "already exists on destination");
            }
            Ok(true) => {
                if let Err(e) = self.drop_destination_pool(pool).await {
                    tracing::error!("Dropping existing pool [{}] failed: {}", pool, e);
                    return PoolOutcome::failed(pool, format!("dropping existing pool failed: {}", e));
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Conflict check for pool [{}] failed: {}", pool, e);
                return PoolOutcome::failed(pool, format!("conflict check failed: {}", e));
            }
        }

        let script = match self.source.script_resource_pool(pool).await {
            Ok(script) => script,
            Err(e) => {
                tracing::error!("Scripting pool [{}] failed: {}", pool, e);
                return PoolOutcome::failed(pool, format!("scripting failed: {}", e));
            }
        };
        if let Err(e) = self.apply_script(&script).await {
            tracing::error!("{}", e);
            return PoolOutcome::failed(pool, format!("creating pool failed: {}", e));
        }

        let groups = match self.source.list_workload_groups(pool).await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!("Listing workload groups of [{}] failed: {}", pool, e);
                return PoolOutcome::failed(pool, format!("listing workload groups failed: {}", e));
            }
        };

        let mut migrated = 0usize;
        let mut failures: Vec<String> = Vec::new();
        for group in &groups {
            tracing::info!("Copying workload group [{}] into pool [{}]", group, pool);
            let applied = match self.source.script_workload_group(pool, group).await {
                Ok(script) => self.apply_script(&script).await,
                Err(e) => Err(e),
            };
            match applied {
                Ok(()) => migrated += 1,
                Err(e) => {
                    tracing::error!("Workload group [{}] failed: {}", group, e);
                    failures.push(format!("{}: {}", group, e));
                }
            }
        }

        if failures.is_empty() {
            PoolOutcome::migrated(pool, migrated)
        } else {
            // a later group failing leaves the pool half-migrated; recorded, not rolled back
            PoolOutcome {
                pool: pool.to_string(),
                status: PoolStatus::Failed,
                groups_migrated: migrated,
                message: Some(failures.join("; ")),
            }
        }
    }

    /// Queried live on every call; destination state is never cached.
    async fn destination_has_pool(&mut self, pool: &str) -> Result<bool> {
        let pools = self.destination.list_resource_pools().await?;
        Ok(pools.iter().any(|p| p.eq_ignore_ascii_case(pool)))
    }

    /// Workload groups go first, then the pool, then an activation so the
    /// same name can be re-created.
    async fn drop_destination_pool(&mut self, pool: &str) -> Result<()> {
        tracing::info!(
            "Force: dropping pool [{}] on {} before re-creating it",
            pool,
            self.destination.server_name()
        );
        let groups = self.destination.list_workload_groups(pool).await?;
        for group in &groups {
            self.execute_on_destination(pool, &format!("DROP WORKLOAD GROUP {}", bracket(group)))
                .await?;
        }
        self.execute_on_destination(pool, &format!("DROP RESOURCE POOL {}", bracket(pool)))
            .await?;
        self.execute_on_destination(pool, "ALTER RESOURCE GOVERNOR RECONFIGURE")
            .await?;
        Ok(())
    }

    async fn apply_script(&mut self, script: &SqlScript) -> Result<()> {
        let source_name = self.source.server_name().to_string();
        let destination_name = self.destination.server_name().to_string();

        for batch in &script.batches {
            let sql = substitute_server_name(batch, &source_name, &destination_name);
            if self.settings.dry_run() {
                tracing::info!(
                    "🔍 dry run: would execute on {}: {}",
                    destination_name,
                    summary_line(&sql)
                );
                continue;
            }
            tracing::debug!("Executing on {}: {}", destination_name, summary_line(&sql));
            self.destination
                .execute(&sql)
                .await
                .map_err(|e| MigrateError::ExecutionError {
                    object: script.object.clone(),
                    server: destination_name.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn execute_on_destination(&mut self, object: &str, sql: &str) -> Result<()> {
        if self.settings.dry_run() {
            tracing::info!(
                "🔍 dry run: would execute on {}: {}",
                self.destination.server_name(),
                summary_line(sql)
            );
            return Ok(());
        }
        let server = self.destination.server_name().to_string();
        self.destination
            .execute(sql)
            .await
            .map_err(|e| MigrateError::ExecutionError {
                object: object.to_string(),
                server,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn reconfigure(&mut self) -> bool {
        if !self.destination.properties().supports_resource_governor() {
            tracing::warn!(
                "Destination edition '{}' does not support Resource Governor; skipping reconfigure",
                self.destination.properties().edition
            );
            return false;
        }
        if self.settings.dry_run() {
            tracing::info!("🔍 dry run: would execute ALTER RESOURCE GOVERNOR RECONFIGURE");
            return false;
        }
        match self
            .destination
            .execute("ALTER RESOURCE GOVERNOR RECONFIGURE")
            .await
        {
            Ok(_) => {
                tracing::info!("Resource Governor reconfigured on {}", self.destination.server_name());
                true
            }
            Err(e) => {
                tracing::error!("Reconfigure failed: {}", e);
                false
            }
        }
    }
}
