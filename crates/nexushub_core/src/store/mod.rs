//! SQLite storage for tenant-scoped records.
//!
//! # Responsibility
//! - Translate typed filters and sort specs into bound SQL.
//! - Read and write rows of the shared `records` table.
//!
//! Validation and lifecycle rules live in `repo`; this layer only executes.

pub mod filter_sql;
pub mod record_store;

pub use filter_sql::{compile_filter, order_clause, CompiledFilter};
pub use record_store::RecordStore;
