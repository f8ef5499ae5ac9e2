use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("SQL Server error: {0}")]
    SqlError(#[from] tiberius::error::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Connection to {server} failed: {reason}")]
    ConnectionError { server: String, reason: String },

    #[error("{server} cannot take part in the migration: {reason}")]
    UnsupportedServerError { server: String, reason: String },

    #[error("Scripting {object} failed: {reason}")]
    ScriptingError { object: String, reason: String },

    #[error("Executing DDL for {object} on {server} failed: {reason}")]
    ExecutionError {
        object: String,
        server: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Scripting,
    Execution,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Informational, the run still counts as successful.
    Low,
    /// A single object failed, the rest of the run went through.
    Medium,
    /// The run could not produce a useful result.
    High,
    /// Environment or server-side failure outside our control.
    Critical,
}

impl MigrateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MigrateError::ConfigError { .. }
            | MigrateError::MissingConfigError { .. }
            | MigrateError::InvalidConfigValueError { .. }
            | MigrateError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            MigrateError::ConnectionError { .. } | MigrateError::UnsupportedServerError { .. } => {
                ErrorCategory::Connection
            }
            MigrateError::ScriptingError { .. } => ErrorCategory::Scripting,
            MigrateError::ExecutionError { .. } | MigrateError::SqlError(_) => {
                ErrorCategory::Execution
            }
            MigrateError::IoError(_) | MigrateError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Connection => ErrorSeverity::Critical,
            ErrorCategory::Scripting | ErrorCategory::Execution => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            MigrateError::ConfigError { .. }
            | MigrateError::MissingConfigError { .. }
            | MigrateError::InvalidConfigValueError { .. }
            | MigrateError::ConfigValidationError { .. } => {
                "Check the command-line flags and the TOML configuration file".to_string()
            }
            MigrateError::ConnectionError { server, .. } => format!(
                "Verify that {} is reachable and that the supplied credentials are valid",
                server
            ),
            MigrateError::UnsupportedServerError { .. } => {
                "Resource Governor requires SQL Server 2008 or later".to_string()
            }
            MigrateError::ScriptingError { .. } => {
                "Verify that the login can read the Resource Governor catalog views".to_string()
            }
            MigrateError::ExecutionError { .. } | MigrateError::SqlError(_) => {
                "Verify that the login holds CONTROL SERVER on the destination".to_string()
            }
            MigrateError::IoError(_) | MigrateError::SerializationError(_) => {
                "Check file permissions and free disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MigrateError::ConnectionError { server, reason } => {
                format!("Could not connect to {}: {}", server, reason)
            }
            MigrateError::UnsupportedServerError { server, reason } => {
                format!("{} is not supported: {}", server, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
