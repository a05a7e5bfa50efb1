//! Project descriptor and owner/status queries.

use crate::model::record::{Record, TenantId};
use crate::repo::{ListFilter, Page, Pagination, RecordRepository, RepoResult};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FilterDef, SortSpec,
};
use uuid::Uuid;

pub const PROJECT_STATUSES: &[&str] = &["active", "completed", "archived", "on_hold"];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "project",
    fields: &[
        FieldDef::text("name")
            .required()
            .rule(FieldRule::MaxLen(255)),
        FieldDef::text("description"),
        FieldDef::text("status")
            .required()
            .rule(FieldRule::Choices(PROJECT_STATUSES))
            .default_value(DefaultValue::Text("active")),
        FieldDef::integer("priority")
            .rule(FieldRule::IntRange(1, 5))
            .default_value(DefaultValue::Integer(3)),
        FieldDef::date("start_date"),
        FieldDef::date("deadline"),
        FieldDef::datetime("completed_at"),
        FieldDef::uuid("owner_id"),
        FieldDef::uuid("team_id"),
        FieldDef::uuid("parent_project_id"),
        FieldDef::text("repository_url").rule(FieldRule::MaxLen(500)),
        FieldDef::text("external_id").rule(FieldRule::MaxLen(100)),
        FieldDef::text("color").rule(FieldRule::MaxLen(7)),
        FieldDef::tags("tags"),
        FieldDef::boolean("is_favorite").default_value(DefaultValue::Boolean(false)),
    ],
    filters: &[
        FilterDef::equality("status"),
        FilterDef::equality("owner_id"),
        FilterDef::equality("team_id"),
        FilterDef::equality("parent_project_id"),
        FilterDef::equality("tags"),
        FilterDef::equality("is_favorite"),
        FilterDef::range("priority"),
        FilterDef::range("deadline"),
        FilterDef::substring("name"),
        FilterDef::substring("description"),
    ],
    export_fields: &[
        "name",
        "status",
        "priority",
        "start_date",
        "deadline",
        "owner_id",
        "team_id",
        "external_id",
        "repository_url",
        "tags",
        "description",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

entity_repository!(
    /// Projects of one tenant.
    ProjectRepository,
    SCHEMA
);

impl ProjectRepository<'_> {
    pub fn by_owner(
        &self,
        tenant: TenantId,
        owner_id: Uuid,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &ListFilter::new().eq("owner_id", owner_id), pagination)
    }

    pub fn by_status(
        &self,
        tenant: TenantId,
        status: &str,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &ListFilter::new().eq("status", status), pagination)
    }
}
