use crate::utils::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// TOML counterpart of the command-line flags:
///
/// ```toml
/// [source]
/// host = "sql01"
/// user = "migrator"
/// password = "${RG_SOURCE_PASSWORD}"
///
/// [destination]
/// host = "sql02"
/// port = 1533
///
/// [migration]
/// exclude = ["legacy_pool"]
/// force = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub source: EndpointConfig,
    pub destination: EndpointConfig,
    pub migration: Option<MigrationSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSection {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub reserved_pools: Option<Vec<String>>,
    pub force: Option<bool>,
    pub dry_run: Option<bool>,
    pub report: Option<String>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MigrateError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| MigrateError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// Expands `${VAR_NAME}` placeholders from the environment; unknown
/// variables are left in place so the parse error names them.
fn substitute_env_vars(content: &str) -> String {
    use regex::Regex;
    let re = Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_config() {
        let toml_content = r#"
[source]
host = "sql01"
user = "migrator"
password = "secret"

[destination]
host = "sql02"
port = 1533

[migration]
include = ["pool_a"]
force = true
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.source.host, "sql01");
        assert_eq!(config.source.user.as_deref(), Some("migrator"));
        assert_eq!(config.destination.port, Some(1533));

        let migration = config.migration.unwrap();
        assert_eq!(migration.include.unwrap(), vec!["pool_a"]);
        assert_eq!(migration.force, Some(true));
        assert!(migration.reserved_pools.is_none());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_RG_PASSWORD", "from-env");

        let toml_content = r#"
[source]
host = "sql01"
user = "sa"
password = "${TEST_RG_PASSWORD}"

[destination]
host = "sql02"
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.source.password.as_deref(), Some("from-env"));

        std::env::remove_var("TEST_RG_PASSWORD");
    }

    #[test]
    fn test_unknown_env_var_is_left_in_place() {
        let toml_content = r#"
[source]
host = "${RG_DOES_NOT_EXIST_FOR_SURE}"

[destination]
host = "sql02"
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.source.host, "${RG_DOES_NOT_EXIST_FOR_SURE}");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        assert!(FileConfig::from_toml_str("not toml at all [").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[source]
host = "sql01"

[destination]
host = "sql02"

[migration]
reserved_pools = ["internal", "default", "vendor_reserved"]
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = FileConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.migration.unwrap().reserved_pools.unwrap(),
            vec!["internal", "default", "vendor_reserved"]
        );
    }
}
