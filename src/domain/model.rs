use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource Governor shipped with SQL Server 2008.
pub const MIN_MAJOR_VERSION: u32 = 10;

/// EngineEdition 3 covers Enterprise, Developer and Evaluation, the
/// editions where Resource Governor limits are actually enforced.
pub const ENGINE_EDITION_ENTERPRISE: i32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProperties {
    pub name: String,
    pub product_version: String,
    pub major_version: u32,
    pub edition: String,
    pub engine_edition: i32,
}

impl ServerProperties {
    pub fn new(
        name: impl Into<String>,
        product_version: impl Into<String>,
        edition: impl Into<String>,
        engine_edition: i32,
    ) -> Self {
        let product_version = product_version.into();
        let major_version = parse_major_version(&product_version);
        Self {
            name: name.into(),
            product_version,
            major_version,
            edition: edition.into(),
            engine_edition,
        }
    }

    pub fn meets_version_floor(&self) -> bool {
        self.major_version >= MIN_MAJOR_VERSION
    }

    pub fn supports_resource_governor(&self) -> bool {
        self.engine_edition == ENGINE_EDITION_ENTERPRISE
    }
}

/// Major release number out of a ProductVersion string like "16.0.1000.6".
pub fn parse_major_version(product_version: &str) -> u32 {
    product_version
        .split('.')
        .next()
        .and_then(|part| part.trim().parse().ok())
        .unwrap_or(0)
}

/// DDL for one scripted object. tiberius executes one batch at a time,
/// so the scripter hands batches over pre-split instead of `GO`-separated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlScript {
    pub object: String,
    pub batches: Vec<String>,
}

impl SqlScript {
    pub fn new(object: impl Into<String>, batches: Vec<String>) -> Self {
        Self {
            object: object.into(),
            batches,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Migrated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolOutcome {
    pub pool: String,
    pub status: PoolStatus,
    pub groups_migrated: usize,
    pub message: Option<String>,
}

impl PoolOutcome {
    pub fn migrated(pool: impl Into<String>, groups_migrated: usize) -> Self {
        Self {
            pool: pool.into(),
            status: PoolStatus::Migrated,
            groups_migrated,
            message: None,
        }
    }

    pub fn skipped(pool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            status: PoolStatus::Skipped,
            groups_migrated: 0,
            message: Some(message.into()),
        }
    }

    pub fn failed(pool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            status: PoolStatus::Failed,
            groups_migrated: 0,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub settings_copied: bool,
    pub reconfigured: bool,
    pub pools: Vec<PoolOutcome>,
}

impl MigrationReport {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, dry_run: bool) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            settings_copied: false,
            reconfigured: false,
            pools: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn migrated_count(&self) -> usize {
        self.count_with_status(PoolStatus::Migrated)
    }

    pub fn skipped_count(&self) -> usize {
        self.count_with_status(PoolStatus::Skipped)
    }

    pub fn failed_count(&self) -> usize {
        self.count_with_status(PoolStatus::Failed)
    }

    fn count_with_status(&self, status: PoolStatus) -> usize {
        self.pools.iter().filter(|p| p.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_major_version() {
        assert_eq!(parse_major_version("16.0.1000.6"), 16);
        assert_eq!(parse_major_version("10.50.2500.0"), 10);
        assert_eq!(parse_major_version("garbage"), 0);
        assert_eq!(parse_major_version(""), 0);
    }

    #[test]
    fn test_version_floor() {
        let old = ServerProperties::new("sql01", "9.0.5000.0", "Enterprise Edition", 3);
        assert!(!old.meets_version_floor());

        let new = ServerProperties::new("sql01", "15.0.2000.5", "Enterprise Edition", 3);
        assert!(new.meets_version_floor());
    }

    #[test]
    fn test_edition_support() {
        let enterprise = ServerProperties::new("sql01", "16.0.1000.6", "Enterprise Edition", 3);
        assert!(enterprise.supports_resource_governor());

        let standard = ServerProperties::new("sql02", "16.0.1000.6", "Standard Edition", 2);
        assert!(!standard.supports_resource_governor());
    }

    #[test]
    fn test_report_counters() {
        let mut report = MigrationReport::new("sql01", "sql02", false);
        report.pools.push(PoolOutcome::migrated("pool_a", 2));
        report.pools.push(PoolOutcome::skipped("pool_b", "already exists"));
        report.pools.push(PoolOutcome::failed("pool_c", "boom"));
        report.finish();

        assert_eq!(report.migrated_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.finished_at.is_some());
    }
}
