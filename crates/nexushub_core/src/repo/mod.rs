//! Repository layer: tenant-scoped contracts over the record store.
//!
//! # Responsibility
//! - Define the generic record repository contract and its SQLite backend.
//! - Own query, pagination and bulk outcome types exposed to callers.
//!
//! # Invariants
//! - Writes are validated against the entity descriptor before any SQL
//!   mutation.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidFilter`) in
//!   addition to DB transport errors.

pub mod bulk;
pub mod error;
pub mod query;
pub mod record_repo;

pub use bulk::{BulkFailure, BulkFailureKind, BulkItem, BulkOutcome, BulkResult};
pub use error::{RepoError, RepoResult};
pub use query::{ListFilter, Page, Pagination, Predicate, PredicateOp};
pub use record_repo::{RecordRepository, SqliteRecordRepository};
