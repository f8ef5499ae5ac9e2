use crate::domain::model::{ServerProperties, SqlScript};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Everything the migration needs from a live SQL Server instance.
/// The tiberius adapter is the real implementation; tests use fakes.
#[async_trait]
pub trait ServerSession: Send {
    fn server_name(&self) -> &str;

    fn properties(&self) -> &ServerProperties;

    /// Server-level Resource Governor state: classifier function and
    /// enabled flag, as executable DDL batches.
    async fn script_governor_settings(&mut self) -> Result<SqlScript>;

    /// Names of every resource pool on the instance, reserved ones included.
    async fn list_resource_pools(&mut self) -> Result<Vec<String>>;

    async fn script_resource_pool(&mut self, pool: &str) -> Result<SqlScript>;

    /// Names of the workload groups bound to one pool.
    async fn list_workload_groups(&mut self, pool: &str) -> Result<Vec<String>>;

    async fn script_workload_group(&mut self, pool: &str, group: &str) -> Result<SqlScript>;

    /// Runs one T-SQL batch, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;
}

pub trait MigrationSettings: Send + Sync {
    fn include_pools(&self) -> &[String];
    fn exclude_pools(&self) -> &[String];
    fn reserved_pools(&self) -> &[String];
    fn force(&self) -> bool;
    fn dry_run(&self) -> bool;
}
