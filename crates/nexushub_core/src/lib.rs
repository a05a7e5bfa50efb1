//! Core record store for NexusHub.
//! This crate is the single source of truth for tenant isolation, soft
//! delete, and per-entity validation rules.

pub mod config;
pub mod db;
pub mod domain;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod store;
pub mod transfer;

pub use config::{ConfigError, RepoConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::record::{FieldMap, Record, RecordId, TenantId};
pub use repo::{
    BulkFailureKind, BulkResult, ListFilter, Page, Pagination, RecordRepository, RepoError,
    RepoResult, SqliteRecordRepository,
};
pub use schema::{EntitySchema, FieldErrorKind, FieldValue, ValidationError};
pub use transfer::{ExportTable, ImportResult, RecordTransfer, TransferError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
