pub mod engine;
pub mod script;

pub use crate::domain::model::{MigrationReport, PoolOutcome, PoolStatus, SqlScript};
pub use crate::domain::ports::{MigrationSettings, ServerSession};
pub use crate::utils::error::Result;
