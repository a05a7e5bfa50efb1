//! Tenant-scoped record model.
//!
//! # Responsibility
//! - Define the canonical stored shape shared by every business entity.
//! - Provide lifecycle checks for soft-delete and audit timestamps.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `tenant_id` never changes after creation.
//! - `deleted_at` is set iff `is_deleted` is true.
//! - `updated_at >= created_at`.

use crate::schema::value::FieldValue;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one record.
pub type RecordId = Uuid;

/// Entity-specific field values keyed by declared field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Identifier of the owning tenant.
///
/// A distinct type so a record id can never be passed where the
/// authenticated tenant is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TenantId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored business record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub tenant_id: TenantId,
    /// Entity discriminator from the owning descriptor.
    pub entity: &'static str,
    /// Only non-null values are present.
    pub fields: FieldMap,
    /// Soft delete tombstone; deleted rows stay addressable by id.
    pub is_deleted: bool,
    /// Epoch milliseconds; set iff `is_deleted`.
    pub deleted_at: Option<i64>,
    /// Epoch milliseconds, set once on create.
    pub created_at: i64,
    /// Epoch milliseconds, bumped by every successful mutation.
    pub updated_at: i64,
}

impl Record {
    /// Returns the stored value of `field`, `None` when unset.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn uuid(&self, field: &str) -> Option<Uuid> {
        self.get(field).and_then(FieldValue::as_uuid)
    }

    /// Returns whether this record is visible to default reads.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Checks lifecycle invariants of a persisted row.
    ///
    /// # Errors
    /// Returns a message describing the first broken invariant.
    pub fn check_lifecycle(&self) -> Result<(), String> {
        if self.is_deleted != self.deleted_at.is_some() {
            return Err(format!(
                "record {} has is_deleted={} but deleted_at={:?}",
                self.id, self.is_deleted, self.deleted_at
            ));
        }
        if self.updated_at < self.created_at {
            return Err(format!(
                "record {} has updated_at {} before created_at {}",
                self.id, self.updated_at, self.created_at
            ));
        }
        Ok(())
    }
}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Builds a [`FieldMap`] from `name => value` pairs.
///
/// Values go through `FieldValue::from`, so plain literals work:
/// `fields! { "name" => "Acme", "employee_count" => 12_i64 }`.
#[macro_export]
macro_rules! fields {
    () => {
        $crate::FieldMap::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::FieldMap::new();
        $(
            map.insert(
                ::std::string::String::from($name),
                $crate::FieldValue::from($value),
            );
        )+
        map
    }};
}
