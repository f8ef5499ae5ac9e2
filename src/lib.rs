pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ResolvedConfig;

pub use adapters::mssql::{ConnectionOptions, MssqlSession};
pub use core::engine::MigrationEngine;
pub use domain::model::{MigrationReport, PoolOutcome, PoolStatus, ServerProperties, SqlScript};
pub use domain::ports::{MigrationSettings, ServerSession};
pub use utils::error::{MigrateError, Result};
