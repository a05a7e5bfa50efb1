//! Record model shared by every entity type.
//!
//! # Responsibility
//! - Define the canonical tenant-scoped record used by all repositories.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod record;
