//! Activity descriptor and timeline queries.

use crate::model::record::{Record, RecordId, TenantId};
use crate::repo::{ListFilter, Pagination, RecordRepository, RepoResult};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FieldValue, FilterDef, SortDirection,
    SortSpec,
};

pub const ACTIVITY_TYPES: &[&str] = &["call", "email", "meeting", "note", "task"];
pub const ACTIVITY_STATUSES: &[&str] = &["planned", "completed", "cancelled"];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "activity",
    fields: &[
        FieldDef::text("type")
            .required()
            .rule(FieldRule::Choices(ACTIVITY_TYPES)),
        FieldDef::text("subject")
            .required()
            .rule(FieldRule::MaxLen(500)),
        FieldDef::text("description"),
        FieldDef::integer("duration_minutes").rule(FieldRule::IntRange(0, 10_080)),
        FieldDef::uuid("user_id").required(),
        FieldDef::uuid("company_id"),
        FieldDef::uuid("contact_id"),
        FieldDef::uuid("deal_id"),
        FieldDef::text("status")
            .rule(FieldRule::Choices(ACTIVITY_STATUSES))
            .default_value(DefaultValue::Text("completed")),
        FieldDef::text("outcome").rule(FieldRule::MaxLen(100)),
        FieldDef::datetime("activity_date").required(),
        FieldDef::datetime("completed_at"),
    ],
    filters: &[
        FilterDef::equality("type"),
        FilterDef::equality("status"),
        FilterDef::equality("user_id"),
        FilterDef::equality("company_id"),
        FilterDef::equality("contact_id"),
        FilterDef::equality("deal_id"),
        FilterDef::range("activity_date"),
        FilterDef::substring("subject"),
    ],
    export_fields: &[
        "type",
        "subject",
        "status",
        "activity_date",
        "duration_minutes",
        "outcome",
        "user_id",
        "company_id",
        "contact_id",
        "deal_id",
        "description",
    ],
    default_sort: SortSpec::by_field("activity_date", SortDirection::Desc),
};

/// Record an activity timeline is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTarget {
    Company(RecordId),
    Contact(RecordId),
    Deal(RecordId),
}

impl ActivityTarget {
    fn field(self) -> (&'static str, RecordId) {
        match self {
            Self::Company(id) => ("company_id", id),
            Self::Contact(id) => ("contact_id", id),
            Self::Deal(id) => ("deal_id", id),
        }
    }
}

entity_repository!(
    /// Calls, meetings and other timeline entries of one tenant.
    ActivityRepository,
    SCHEMA
);

impl ActivityRepository<'_> {
    /// Planned activities at or after `now_ms`, soonest first.
    pub fn upcoming(&self, tenant: TenantId, now_ms: i64, limit: usize) -> RepoResult<Vec<Record>> {
        let filter = ListFilter::new().eq("status", "planned").range(
            "activity_date",
            Some(FieldValue::DateTime(now_ms)),
            None,
        );
        let mut planned = self.records.collect_all(tenant, &filter)?;
        planned.sort_by_key(|record| (activity_date(record), record.id));
        planned.truncate(limit);
        Ok(planned)
    }

    /// Planned activities scheduled strictly before `now_ms`, most recent
    /// first.
    pub fn overdue(&self, tenant: TenantId, now_ms: i64) -> RepoResult<Vec<Record>> {
        let filter = ListFilter::new().eq("status", "planned").range(
            "activity_date",
            None,
            Some(FieldValue::DateTime(now_ms.saturating_sub(1))),
        );
        self.records.collect_all(tenant, &filter)
    }

    /// Latest activities linked to `target`, newest first.
    pub fn timeline(
        &self,
        tenant: TenantId,
        target: ActivityTarget,
        limit: u32,
    ) -> RepoResult<Vec<Record>> {
        let (field, id) = target.field();
        let page = self.records.list(
            tenant,
            &ListFilter::new().eq(field, id),
            Pagination::first(limit),
        )?;
        Ok(page.items)
    }
}

fn activity_date(record: &Record) -> i64 {
    record
        .get("activity_date")
        .and_then(FieldValue::as_datetime)
        .unwrap_or_default()
}
