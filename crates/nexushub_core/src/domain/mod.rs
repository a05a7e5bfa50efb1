//! Entity descriptors and thin domain repositories.
//!
//! # Responsibility
//! - Declare one static descriptor per business entity.
//! - Expose entity-specific queries built only from declared filters.
//!
//! # Invariants
//! - Domain repositories hold no state besides the generic repository.
//! - Every query takes the tenant explicitly, like the generic operations.
//! - State transitions are plain field updates through the generic path.

/// Declares a domain repository wrapping `SqliteRecordRepository` for one
/// descriptor, with `try_new`, `with_config` and `records`.
macro_rules! entity_repository {
    ($(#[$meta:meta])* $name:ident, $schema:path) => {
        $(#[$meta])*
        pub struct $name<'conn> {
            records: $crate::repo::SqliteRecordRepository<'conn>,
        }

        impl<'conn> $name<'conn> {
            /// Creates the repository with default configuration.
            pub fn try_new(conn: &'conn ::rusqlite::Connection) -> $crate::repo::RepoResult<Self> {
                Self::with_config(conn, $crate::config::RepoConfig::default())
            }

            pub fn with_config(
                conn: &'conn ::rusqlite::Connection,
                config: $crate::config::RepoConfig,
            ) -> $crate::repo::RepoResult<Self> {
                Ok(Self {
                    records: $crate::repo::SqliteRecordRepository::with_config(
                        conn, &$schema, config,
                    )?,
                })
            }

            /// Generic CRUD, bulk and transfer entry point.
            pub fn records(&self) -> &$crate::repo::SqliteRecordRepository<'conn> {
                &self.records
            }
        }
    };
}

pub mod activity;
pub mod comment;
pub mod company;
pub mod contact;
pub mod custom_field;
pub mod deal;
pub mod notification;
pub mod project;
pub mod task;
pub mod team;

pub use activity::{ActivityRepository, ActivityTarget};
pub use comment::CommentRepository;
pub use company::CompanyRepository;
pub use contact::ContactRepository;
pub use custom_field::CustomFieldRepository;
pub use deal::{DealRepository, Forecast, StageSummary};
pub use notification::NotificationRepository;
pub use project::ProjectRepository;
pub use task::TaskRepository;
pub use team::TeamRepository;
