#![allow(dead_code)]

use async_trait::async_trait;
use rg_migrate::{
    MigrateError, MigrationSettings, Result, ServerProperties, ServerSession, SqlScript,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// In-process stand-in for a SQL Server instance. Mutating statements are
/// appended to a shared log so tests can assert on exactly what would have
/// hit the wire.
pub struct MockServer {
    properties: ServerProperties,
    pools: Vec<(String, Vec<String>)>,
    executed: Arc<Mutex<Vec<String>>>,
    fail_script_pools: HashSet<String>,
    fail_execute_containing: Option<String>,
}

impl MockServer {
    pub fn new(name: &str) -> Self {
        Self {
            properties: ServerProperties::new(
                name,
                "16.0.1000.6",
                "Enterprise Edition (64-bit)",
                3,
            ),
            pools: vec![
                ("internal".to_string(), Vec::new()),
                ("default".to_string(), vec!["default".to_string()]),
            ],
            executed: Arc::new(Mutex::new(Vec::new())),
            fail_script_pools: HashSet::new(),
            fail_execute_containing: None,
        }
    }

    pub fn with_version(mut self, product_version: &str) -> Self {
        self.properties = ServerProperties::new(
            self.properties.name.clone(),
            product_version,
            self.properties.edition.clone(),
            self.properties.engine_edition,
        );
        self
    }

    pub fn with_edition(mut self, edition: &str, engine_edition: i32) -> Self {
        self.properties = ServerProperties::new(
            self.properties.name.clone(),
            self.properties.product_version.clone(),
            edition,
            engine_edition,
        );
        self
    }

    pub fn with_pool(mut self, pool: &str, groups: &[&str]) -> Self {
        self.pools.push((
            pool.to_string(),
            groups.iter().map(|g| g.to_string()).collect(),
        ));
        self
    }

    pub fn failing_pool_script(mut self, pool: &str) -> Self {
        self.fail_script_pools.insert(pool.to_string());
        self
    }

    pub fn failing_execute_containing(mut self, fragment: &str) -> Self {
        self.fail_execute_containing = Some(fragment.to_string());
        self
    }

    pub fn executed_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }
}

#[async_trait]
impl ServerSession for MockServer {
    fn server_name(&self) -> &str {
        &self.properties.name
    }

    fn properties(&self) -> &ServerProperties {
        &self.properties
    }

    async fn script_governor_settings(&mut self) -> Result<SqlScript> {
        Ok(SqlScript::new(
            "resource governor settings",
            vec![format!(
                "ALTER RESOURCE GOVERNOR WITH (CLASSIFIER_FUNCTION = NULL) /* scripted from [{}] */",
                self.properties.name
            )],
        ))
    }

    async fn list_resource_pools(&mut self) -> Result<Vec<String>> {
        Ok(self.pools.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn script_resource_pool(&mut self, pool: &str) -> Result<SqlScript> {
        if self.fail_script_pools.contains(pool) {
            return Err(MigrateError::ScriptingError {
                object: format!("resource pool [{}]", pool),
                reason: "catalog view unavailable".to_string(),
            });
        }
        Ok(SqlScript::new(
            format!("resource pool [{}]", pool),
            vec![format!(
                "CREATE RESOURCE POOL [{}] WITH (MIN_CPU_PERCENT = 0, MAX_CPU_PERCENT = 100)",
                pool
            )],
        ))
    }

    async fn list_workload_groups(&mut self, pool: &str) -> Result<Vec<String>> {
        Ok(self
            .pools
            .iter()
            .find(|(name, _)| name == pool)
            .map(|(_, groups)| groups.clone())
            .unwrap_or_default())
    }

    async fn script_workload_group(&mut self, pool: &str, group: &str) -> Result<SqlScript> {
        Ok(SqlScript::new(
            format!("workload group [{}]", group),
            vec![format!(
                "CREATE WORKLOAD GROUP [{}] WITH (IMPORTANCE = MEDIUM) USING [{}]",
                group, pool
            )],
        ))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        if let Some(fragment) = &self.fail_execute_containing {
            if sql.contains(fragment.as_str()) {
                return Err(MigrateError::ExecutionError {
                    object: "statement".to_string(),
                    server: self.properties.name.clone(),
                    reason: "simulated failure".to_string(),
                });
            }
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }
}

pub struct TestSettings {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub reserved: Vec<String>,
    pub force: bool,
    pub dry_run: bool,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            reserved: vec!["internal".to_string(), "default".to_string()],
            force: false,
            dry_run: false,
        }
    }
}

impl MigrationSettings for TestSettings {
    fn include_pools(&self) -> &[String] {
        &self.include
    }

    fn exclude_pools(&self) -> &[String] {
        &self.exclude
    }

    fn reserved_pools(&self) -> &[String] {
        &self.reserved
    }

    fn force(&self) -> bool {
        self.force
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

pub fn statements(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn position_of(statements: &[String], fragment: &str) -> usize {
    statements
        .iter()
        .position(|sql| sql.contains(fragment))
        .unwrap_or_else(|| panic!("no executed statement contains '{}'", fragment))
}
