pub mod toml_config;

use crate::adapters::mssql::ConnectionOptions;
use crate::domain::ports::MigrationSettings;
use crate::utils::error::{MigrateError, Result};
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use toml_config::{EndpointConfig, FileConfig};

/// The two pools the engine creates on its own. Overridable because new
/// reserved names may appear in later engine releases.
pub fn default_reserved_pools() -> Vec<String> {
    vec!["internal".to_string(), "default".to_string()]
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "rg-migrate")]
#[command(about = "Copies SQL Server Resource Governor configuration between instances")]
pub struct CliConfig {
    /// Source instance, `host` or `host,port`
    #[arg(long, required_unless_present = "config")]
    pub source: Option<String>,

    /// Destination instance, `host` or `host,port`
    #[arg(long, required_unless_present = "config")]
    pub destination: Option<String>,

    #[arg(long)]
    pub source_user: Option<String>,

    #[arg(long)]
    pub source_password: Option<String>,

    #[arg(long)]
    pub dest_user: Option<String>,

    #[arg(long)]
    pub dest_password: Option<String>,

    /// Only migrate these pools
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Never migrate these pools
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Pool names treated as engine-owned and never migrated
    #[arg(long, value_delimiter = ',', default_values_t = default_reserved_pools())]
    pub reserved: Vec<String>,

    #[arg(long, help = "Drop and re-create pools that already exist on the destination")]
    pub force: bool,

    #[arg(long, help = "Describe every change without applying any of them")]
    pub dry_run: bool,

    #[arg(long, help = "Write a JSON migration report to this path")]
    pub report: Option<String>,

    #[arg(long, help = "Load settings from a TOML file (flags override it)")]
    pub config: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process resource usage after the run")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Folds the optional TOML file into the flags. Flags win wherever both
    /// supply a value.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let file = self
            .config
            .as_deref()
            .map(FileConfig::from_file)
            .transpose()?;

        let source = endpoint_options(
            self.source.as_deref(),
            self.source_user.as_deref(),
            self.source_password.as_deref(),
            file.as_ref().map(|f| &f.source),
            "source",
        )?;
        let destination = endpoint_options(
            self.destination.as_deref(),
            self.dest_user.as_deref(),
            self.dest_password.as_deref(),
            file.as_ref().map(|f| &f.destination),
            "destination",
        )?;

        let migration = file.as_ref().and_then(|f| f.migration.as_ref());

        let include = if !self.include.is_empty() {
            self.include.clone()
        } else {
            migration.and_then(|m| m.include.clone()).unwrap_or_default()
        };
        let exclude = if !self.exclude.is_empty() {
            self.exclude.clone()
        } else {
            migration.and_then(|m| m.exclude.clone()).unwrap_or_default()
        };
        let reserved = if self.reserved != default_reserved_pools() {
            self.reserved.clone()
        } else {
            migration
                .and_then(|m| m.reserved_pools.clone())
                .unwrap_or_else(default_reserved_pools)
        };

        Ok(ResolvedConfig {
            source,
            destination,
            include,
            exclude,
            reserved,
            force: self.force || migration.and_then(|m| m.force).unwrap_or(false),
            dry_run: self.dry_run || migration.and_then(|m| m.dry_run).unwrap_or(false),
            report: self
                .report
                .clone()
                .or_else(|| migration.and_then(|m| m.report.clone())),
        })
    }
}

#[cfg(feature = "cli")]
fn endpoint_options(
    spec: Option<&str>,
    user: Option<&str>,
    password: Option<&str>,
    file: Option<&EndpointConfig>,
    field: &str,
) -> Result<ConnectionOptions> {
    let mut options = match (spec, file) {
        (Some(spec), _) => ConnectionOptions::parse(spec)?,
        (None, Some(file)) => {
            let mut options = ConnectionOptions::new(file.host.clone());
            if let Some(port) = file.port {
                options.port = port;
            }
            options
        }
        (None, None) => {
            return Err(MigrateError::MissingConfigError {
                field: field.to_string(),
            })
        }
    };
    options.user = user
        .map(str::to_string)
        .or_else(|| file.and_then(|f| f.user.clone()));
    options.password = password
        .map(str::to_string)
        .or_else(|| file.and_then(|f| f.password.clone()));
    Ok(options)
}

/// Fully merged settings the engine and the adapter run from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source: ConnectionOptions,
    pub destination: ConnectionOptions,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub reserved: Vec<String>,
    pub force: bool,
    pub dry_run: bool,
    pub report: Option<String>,
}

impl MigrationSettings for ResolvedConfig {
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

impl Validate for ResolvedConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("source", &self.source.host)?;
        validation::validate_non_empty_string("destination", &self.destination.host)?;
        validation::validate_port("source", self.source.port)?;
        validation::validate_port("destination", self.destination.port)?;

        if self.source.host.eq_ignore_ascii_case(&self.destination.host)
            && self.source.port == self.destination.port
        {
            return Err(MigrateError::InvalidConfigValueError {
                field: "destination".to_string(),
                value: self.destination.display_name(),
                reason: "Source and destination are the same instance".to_string(),
            });
        }

        validation::validate_credentials("source", &self.source.user, &self.source.password)?;
        validation::validate_credentials(
            "destination",
            &self.destination.user,
            &self.destination.password,
        )?;

        validation::validate_pool_name_list("include", &self.include)?;
        validation::validate_pool_name_list("exclude", &self.exclude)?;
        validation::validate_pool_name_list("reserved", &self.reserved)?;
        validation::validate_disjoint_lists("include", &self.include, "exclude", &self.exclude)?;

        Ok(())
    }
}
