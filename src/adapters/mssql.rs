use crate::core::script::bracket;
use crate::domain::model::{ServerProperties, SqlScript};
use crate::domain::ports::ServerSession;
use crate::utils::error::{MigrateError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 1433,
            user: None,
            password: None,
        }
    }

    /// Accepts `host`, `host,port` (the SQL Server convention) or
    /// `host:port`. Named instances needing the browser service are not
    /// resolved here.
    pub fn parse(spec: &str) -> Result<Self> {
        let (host, port) = match spec.split_once(',').or_else(|| spec.split_once(':')) {
            Some((host, port)) => {
                let port: u16 = port.trim().parse().map_err(|_| {
                    MigrateError::InvalidConfigValueError {
                        field: "server".to_string(),
                        value: spec.to_string(),
                        reason: format!("'{}' is not a valid port number", port),
                    }
                })?;
                (host.trim(), port)
            }
            None => (spec.trim(), 1433),
        };
        if host.is_empty() {
            return Err(MigrateError::InvalidConfigValueError {
                field: "server".to_string(),
                value: spec.to_string(),
                reason: "Host name cannot be empty".to_string(),
            });
        }
        Ok(Self {
            host: host.to_string(),
            port,
            user: None,
            password: None,
        })
    }

    pub fn display_name(&self) -> String {
        if self.port == 1433 {
            self.host.clone()
        } else {
            format!("{},{}", self.host, self.port)
        }
    }
}

/// One authenticated session against a SQL Server instance. Scripting is
/// realized by reading the Resource Governor catalog views and rendering
/// equivalent DDL, which keeps the session the only place that knows any
/// T-SQL.
pub struct MssqlSession {
    client: TdsClient,
    properties: ServerProperties,
}

const PROPERTIES_SQL: &str = "\
SELECT @@SERVERNAME AS server_name, \
       CAST(SERVERPROPERTY('ProductVersion') AS nvarchar(128)) AS product_version, \
       CAST(SERVERPROPERTY('Edition') AS nvarchar(128)) AS edition, \
       CAST(SERVERPROPERTY('EngineEdition') AS int) AS engine_edition";

const GOVERNOR_CONFIG_SQL: &str = "\
SELECT OBJECT_SCHEMA_NAME(c.classifier_function_id) AS classifier_schema, \
       OBJECT_NAME(c.classifier_function_id) AS classifier_name, \
       m.definition, \
       c.is_enabled \
FROM sys.resource_governor_configuration c \
LEFT JOIN sys.sql_modules m ON m.object_id = c.classifier_function_id";

const LIST_POOLS_SQL: &str =
    "SELECT name FROM sys.resource_governor_resource_pools ORDER BY name";

const LIST_GROUPS_SQL: &str = "\
SELECT g.name \
FROM sys.resource_governor_workload_groups g \
JOIN sys.resource_governor_resource_pools p ON p.pool_id = g.pool_id \
WHERE p.name = @P1 \
ORDER BY g.name";

const GROUP_SETTINGS_SQL: &str = "\
SELECT g.name, g.importance, \
       CAST(g.request_max_memory_grant_percent AS int) AS request_max_memory_grant_percent, \
       g.request_max_cpu_time_sec, g.request_memory_grant_timeout_sec, \
       g.max_dop, g.group_max_requests \
FROM sys.resource_governor_workload_groups g \
JOIN sys.resource_governor_resource_pools p ON p.pool_id = g.pool_id \
WHERE p.name = @P1 AND g.name = @P2";

impl MssqlSession {
    pub async fn connect(options: &ConnectionOptions) -> Result<Self> {
        let mut config = Config::new();
        config.host(&options.host);
        config.port(options.port);
        config.trust_cert();
        match (&options.user, &options.password) {
            (Some(user), Some(password)) => {
                config.authentication(AuthMethod::sql_server(user, password));
            }
            _ => {
                config.authentication(AuthMethod::None);
            }
        }

        let connect_err = |e: String| MigrateError::ConnectionError {
            server: options.display_name(),
            reason: e,
        };

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        tcp.set_nodelay(true).map_err(|e| connect_err(e.to_string()))?;

        let mut client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let properties = read_properties(&mut client).await?;
        tracing::debug!(
            "Connected to {} ({} {})",
            properties.name,
            properties.edition,
            properties.product_version
        );

        Ok(Self { client, properties })
    }

    async fn pool_settings(&mut self, pool: &str) -> Result<PoolSettings> {
        // cap_cpu_percent arrived with 2012, the IOPS pair with 2014;
        // older servers reject a SELECT that names them
        let sql = if self.properties.major_version >= 12 {
            "SELECT name, min_cpu_percent, max_cpu_percent, cap_cpu_percent, \
                    min_memory_percent, max_memory_percent, \
                    min_iops_per_volume, max_iops_per_volume \
             FROM sys.resource_governor_resource_pools WHERE name = @P1"
        } else if self.properties.major_version >= 11 {
            "SELECT name, min_cpu_percent, max_cpu_percent, cap_cpu_percent, \
                    min_memory_percent, max_memory_percent \
             FROM sys.resource_governor_resource_pools WHERE name = @P1"
        } else {
            "SELECT name, min_cpu_percent, max_cpu_percent, \
                    min_memory_percent, max_memory_percent \
             FROM sys.resource_governor_resource_pools WHERE name = @P1"
        };

        let row = self
            .client
            .query(sql, &[&pool])
            .await?
            .into_row()
            .await?
            .ok_or_else(|| MigrateError::ScriptingError {
                object: format!("resource pool [{}]", pool),
                reason: "pool not found in sys.resource_governor_resource_pools".to_string(),
            })?;

        let missing = |column: &str| MigrateError::ScriptingError {
            object: format!("resource pool [{}]", pool),
            reason: format!("column {} came back NULL", column),
        };

        let mut settings = PoolSettings {
            name: row
                .try_get::<&str, _>("name")?
                .ok_or_else(|| missing("name"))?
                .to_string(),
            min_cpu_percent: row
                .try_get::<i32, _>("min_cpu_percent")?
                .ok_or_else(|| missing("min_cpu_percent"))?,
            max_cpu_percent: row
                .try_get::<i32, _>("max_cpu_percent")?
                .ok_or_else(|| missing("max_cpu_percent"))?,
            cap_cpu_percent: None,
            min_memory_percent: row
                .try_get::<i32, _>("min_memory_percent")?
                .ok_or_else(|| missing("min_memory_percent"))?,
            max_memory_percent: row
                .try_get::<i32, _>("max_memory_percent")?
                .ok_or_else(|| missing("max_memory_percent"))?,
            min_iops_per_volume: None,
            max_iops_per_volume: None,
        };
        if self.properties.major_version >= 11 {
            settings.cap_cpu_percent = row.try_get::<i32, _>("cap_cpu_percent")?;
        }
        if self.properties.major_version >= 12 {
            settings.min_iops_per_volume = row.try_get::<i32, _>("min_iops_per_volume")?;
            settings.max_iops_per_volume = row.try_get::<i32, _>("max_iops_per_volume")?;
        }
        Ok(settings)
    }
}

async fn read_properties(client: &mut TdsClient) -> Result<ServerProperties> {
    let row = client
        .query(PROPERTIES_SQL, &[])
        .await?
        .into_row()
        .await?
        .ok_or_else(|| MigrateError::ScriptingError {
            object: "server properties".to_string(),
            reason: "SERVERPROPERTY query returned no row".to_string(),
        })?;

    let name = row
        .try_get::<&str, _>("server_name")?
        .unwrap_or("unknown")
        .to_string();
    let product_version = row
        .try_get::<&str, _>("product_version")?
        .unwrap_or("0")
        .to_string();
    let edition = row
        .try_get::<&str, _>("edition")?
        .unwrap_or("unknown")
        .to_string();
    let engine_edition = row.try_get::<i32, _>("engine_edition")?.unwrap_or(0);

    Ok(ServerProperties::new(name, product_version, edition, engine_edition))
}

#[async_trait]
impl ServerSession for MssqlSession {
    fn server_name(&self) -> &str {
        &self.properties.name
    }

    fn properties(&self) -> &ServerProperties {
        &self.properties
    }

    async fn script_governor_settings(&mut self) -> Result<SqlScript> {
        let row = self
            .client
            .query(GOVERNOR_CONFIG_SQL, &[])
            .await?
            .into_row()
            .await?
            .ok_or_else(|| MigrateError::ScriptingError {
                object: "resource governor settings".to_string(),
                reason: "sys.resource_governor_configuration returned no row".to_string(),
            })?;

        let classifier_schema = row
            .try_get::<&str, _>("classifier_schema")?
            .map(str::to_string);
        let classifier_name = row.try_get::<&str, _>("classifier_name")?.map(str::to_string);
        let definition = row.try_get::<&str, _>("definition")?.map(str::to_string);
        let is_enabled = row.try_get::<bool, _>("is_enabled")?.unwrap_or(true);

        let mut batches = Vec::new();
        match (classifier_schema, classifier_name) {
            (Some(schema), Some(name)) => {
                // ship the classifier function itself; it lives in master
                if let Some(definition) = definition {
                    batches.push(definition);
                }
                batches.push(format!(
                    "ALTER RESOURCE GOVERNOR WITH (CLASSIFIER_FUNCTION = {}.{})",
                    bracket(&schema),
                    bracket(&name)
                ));
            }
            _ => {
                batches.push(
                    "ALTER RESOURCE GOVERNOR WITH (CLASSIFIER_FUNCTION = NULL)".to_string(),
                );
            }
        }
        if !is_enabled {
            batches.push("ALTER RESOURCE GOVERNOR DISABLE".to_string());
        }

        Ok(SqlScript::new("resource governor settings", batches))
    }

    async fn list_resource_pools(&mut self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(LIST_POOLS_SQL, &[])
            .await?
            .into_first_result()
            .await?;
        let mut pools = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = row.try_get::<&str, _>("name")? {
                pools.push(name.to_string());
            }
        }
        Ok(pools)
    }

    async fn script_resource_pool(&mut self, pool: &str) -> Result<SqlScript> {
        let settings = self.pool_settings(pool).await?;
        Ok(SqlScript::new(
            format!("resource pool [{}]", pool),
            vec![render_pool_ddl(&settings)],
        ))
    }

    async fn list_workload_groups(&mut self, pool: &str) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(LIST_GROUPS_SQL, &[&pool])
            .await?
            .into_first_result()
            .await?;
        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = row.try_get::<&str, _>("name")? {
                groups.push(name.to_string());
            }
        }
        Ok(groups)
    }

    async fn script_workload_group(&mut self, pool: &str, group: &str) -> Result<SqlScript> {
        let row = self
            .client
            .query(GROUP_SETTINGS_SQL, &[&pool, &group])
            .await?
            .into_row()
            .await?
            .ok_or_else(|| MigrateError::ScriptingError {
                object: format!("workload group [{}]", group),
                reason: format!("group not found under pool [{}]", pool),
            })?;

        let missing = |column: &str| MigrateError::ScriptingError {
            object: format!("workload group [{}]", group),
            reason: format!("column {} came back NULL", column),
        };

        let settings = GroupSettings {
            name: row
                .try_get::<&str, _>("name")?
                .ok_or_else(|| missing("name"))?
                .to_string(),
            pool: pool.to_string(),
            importance: row
                .try_get::<&str, _>("importance")?
                .unwrap_or("Medium")
                .to_string(),
            request_max_memory_grant_percent: row
                .try_get::<i32, _>("request_max_memory_grant_percent")?
                .ok_or_else(|| missing("request_max_memory_grant_percent"))?,
            request_max_cpu_time_sec: row
                .try_get::<i32, _>("request_max_cpu_time_sec")?
                .ok_or_else(|| missing("request_max_cpu_time_sec"))?,
            request_memory_grant_timeout_sec: row
                .try_get::<i32, _>("request_memory_grant_timeout_sec")?
                .ok_or_else(|| missing("request_memory_grant_timeout_sec"))?,
            max_dop: row.try_get::<i32, _>("max_dop")?.ok_or_else(|| missing("max_dop"))?,
            group_max_requests: row
                .try_get::<i32, _>("group_max_requests")?
                .ok_or_else(|| missing("group_max_requests"))?,
        };

        Ok(SqlScript::new(
            format!("workload group [{}]", group),
            vec![render_group_ddl(&settings)],
        ))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = self.client.execute(sql, &[]).await?;
        Ok(result.total())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PoolSettings {
    pub name: String,
    pub min_cpu_percent: i32,
    pub max_cpu_percent: i32,
    pub cap_cpu_percent: Option<i32>,
    pub min_memory_percent: i32,
    pub max_memory_percent: i32,
    pub min_iops_per_volume: Option<i32>,
    pub max_iops_per_volume: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupSettings {
    pub name: String,
    pub pool: String,
    pub importance: String,
    pub request_max_memory_grant_percent: i32,
    pub request_max_cpu_time_sec: i32,
    pub request_memory_grant_timeout_sec: i32,
    pub max_dop: i32,
    pub group_max_requests: i32,
}

pub(crate) fn render_pool_ddl(pool: &PoolSettings) -> String {
    let mut options = vec![
        format!("MIN_CPU_PERCENT = {}", pool.min_cpu_percent),
        format!("MAX_CPU_PERCENT = {}", pool.max_cpu_percent),
        format!("MIN_MEMORY_PERCENT = {}", pool.min_memory_percent),
        format!("MAX_MEMORY_PERCENT = {}", pool.max_memory_percent),
    ];
    if let Some(cap) = pool.cap_cpu_percent {
        options.push(format!("CAP_CPU_PERCENT = {}", cap));
    }
    if let Some(min_iops) = pool.min_iops_per_volume {
        options.push(format!("MIN_IOPS_PER_VOLUME = {}", min_iops));
    }
    if let Some(max_iops) = pool.max_iops_per_volume {
        options.push(format!("MAX_IOPS_PER_VOLUME = {}", max_iops));
    }
    format!(
        "CREATE RESOURCE POOL {} WITH ({})",
        bracket(&pool.name),
        options.join(", ")
    )
}

pub(crate) fn render_group_ddl(group: &GroupSettings) -> String {
    let options = [
        format!("IMPORTANCE = {}", group.importance.to_uppercase()),
        format!(
            "REQUEST_MAX_MEMORY_GRANT_PERCENT = {}",
            group.request_max_memory_grant_percent
        ),
        format!("REQUEST_MAX_CPU_TIME_SEC = {}", group.request_max_cpu_time_sec),
        format!(
            "REQUEST_MEMORY_GRANT_TIMEOUT_SEC = {}",
            group.request_memory_grant_timeout_sec
        ),
        format!("MAX_DOP = {}", group.max_dop),
        format!("GROUP_MAX_REQUESTS = {}", group.group_max_requests),
    ];
    format!(
        "CREATE WORKLOAD GROUP {} WITH ({}) USING {}",
        bracket(&group.name),
        options.join(", "),
        bracket(&group.pool)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_only() {
        let options = ConnectionOptions::parse("sql01").unwrap();
        assert_eq!(options.host, "sql01");
        assert_eq!(options.port, 1433);
    }

    #[test]
    fn test_parse_host_with_comma_port() {
        let options = ConnectionOptions::parse("sql01,1533").unwrap();
        assert_eq!(options.host, "sql01");
        assert_eq!(options.port, 1533);
    }

    #[test]
    fn test_parse_host_with_colon_port() {
        let options = ConnectionOptions::parse("sql01:1533").unwrap();
        assert_eq!(options.port, 1533);
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(ConnectionOptions::parse("sql01,notaport").is_err());
        assert!(ConnectionOptions::parse("").is_err());
    }

    #[test]
    fn test_display_name_hides_default_port() {
        assert_eq!(ConnectionOptions::parse("sql01").unwrap().display_name(), "sql01");
        assert_eq!(
            ConnectionOptions::parse("sql01,1533").unwrap().display_name(),
            "sql01,1533"
        );
    }

    #[test]
    fn test_render_pool_ddl_base_options() {
        let pool = PoolSettings {
            name: "pool_a".to_string(),
            min_cpu_percent: 10,
            max_cpu_percent: 80,
            cap_cpu_percent: None,
            min_memory_percent: 5,
            max_memory_percent: 90,
            min_iops_per_volume: None,
            max_iops_per_volume: None,
        };
        assert_eq!(
            render_pool_ddl(&pool),
            "CREATE RESOURCE POOL [pool_a] WITH (MIN_CPU_PERCENT = 10, MAX_CPU_PERCENT = 80, \
             MIN_MEMORY_PERCENT = 5, MAX_MEMORY_PERCENT = 90)"
        );
    }

    #[test]
    fn test_render_pool_ddl_with_cap_and_iops() {
        let pool = PoolSettings {
            name: "pool_a".to_string(),
            min_cpu_percent: 0,
            max_cpu_percent: 100,
            cap_cpu_percent: Some(50),
            min_memory_percent: 0,
            max_memory_percent: 100,
            min_iops_per_volume: Some(100),
            max_iops_per_volume: Some(2000),
        };
        let ddl = render_pool_ddl(&pool);
        assert!(ddl.contains("CAP_CPU_PERCENT = 50"));
        assert!(ddl.contains("MIN_IOPS_PER_VOLUME = 100"));
        assert!(ddl.contains("MAX_IOPS_PER_VOLUME = 2000"));
    }

    #[test]
    fn test_render_group_ddl() {
        let group = GroupSettings {
            name: "reporting".to_string(),
            pool: "pool_a".to_string(),
            importance: "Medium".to_string(),
            request_max_memory_grant_percent: 25,
            request_max_cpu_time_sec: 0,
            request_memory_grant_timeout_sec: 0,
            max_dop: 4,
            group_max_requests: 0,
        };
        assert_eq!(
            render_group_ddl(&group),
            "CREATE WORKLOAD GROUP [reporting] WITH (IMPORTANCE = MEDIUM, \
             REQUEST_MAX_MEMORY_GRANT_PERCENT = 25, REQUEST_MAX_CPU_TIME_SEC = 0, \
             REQUEST_MEMORY_GRANT_TIMEOUT_SEC = 0, MAX_DOP = 4, GROUP_MAX_REQUESTS = 0) \
             USING [pool_a]"
        );
    }
}
