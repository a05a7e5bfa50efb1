//! Task descriptor and project/subtask queries.

use crate::model::record::{Record, RecordId, TenantId};
use crate::repo::{ListFilter, Page, Pagination, RecordRepository, RepoResult};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FieldValue, FilterDef, SortSpec,
};
use chrono::NaiveDate;
use uuid::Uuid;

pub const TASK_STATUSES: &[&str] = &["todo", "in_progress", "review", "done", "blocked"];
/// Statuses that still count as outstanding work.
pub const OPEN_TASK_STATUSES: &[&str] = &["todo", "in_progress", "review", "blocked"];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "task",
    fields: &[
        FieldDef::text("title")
            .required()
            .rule(FieldRule::MaxLen(255)),
        FieldDef::text("description"),
        FieldDef::text("status")
            .required()
            .rule(FieldRule::Choices(TASK_STATUSES))
            .default_value(DefaultValue::Text("todo")),
        FieldDef::integer("priority")
            .rule(FieldRule::IntRange(1, 5))
            .default_value(DefaultValue::Integer(3)),
        FieldDef::date("start_date"),
        FieldDef::date("deadline"),
        FieldDef::datetime("completed_at"),
        FieldDef::integer("estimated_hours").rule(FieldRule::IntRange(0, 10_000)),
        FieldDef::integer("actual_hours").rule(FieldRule::IntRange(0, 10_000)),
        FieldDef::uuid("project_id").required(),
        FieldDef::uuid("parent_task_id"),
        FieldDef::uuid("assignee_id"),
        FieldDef::text("external_id").rule(FieldRule::MaxLen(100)),
        FieldDef::tags("tags"),
        FieldDef::boolean("is_milestone").default_value(DefaultValue::Boolean(false)),
    ],
    filters: &[
        FilterDef::equality("status"),
        FilterDef::equality("project_id"),
        FilterDef::equality("parent_task_id"),
        FilterDef::equality("assignee_id"),
        FilterDef::equality("external_id"),
        FilterDef::equality("tags"),
        FilterDef::equality("is_milestone"),
        FilterDef::range("priority"),
        FilterDef::range("deadline"),
        FilterDef::substring("title"),
    ],
    export_fields: &[
        "title",
        "status",
        "priority",
        "start_date",
        "deadline",
        "estimated_hours",
        "actual_hours",
        "project_id",
        "parent_task_id",
        "assignee_id",
        "external_id",
        "tags",
        "description",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

entity_repository!(
    /// Tasks of one tenant, grouped by project and parent task.
    TaskRepository,
    SCHEMA
);

impl TaskRepository<'_> {
    pub fn by_project(
        &self,
        tenant: TenantId,
        project_id: RecordId,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &ListFilter::new().eq("project_id", project_id), pagination)
    }

    pub fn by_assignee(
        &self,
        tenant: TenantId,
        assignee_id: Uuid,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records.list(
            tenant,
            &ListFilter::new().eq("assignee_id", assignee_id),
            pagination,
        )
    }

    /// Direct children of `parent_id`.
    pub fn subtasks(&self, tenant: TenantId, parent_id: RecordId) -> RepoResult<Vec<Record>> {
        self.records
            .collect_all(tenant, &ListFilter::new().eq("parent_task_id", parent_id))
    }

    /// Outstanding tasks whose deadline is before `today`.
    pub fn overdue(&self, tenant: TenantId, today: NaiveDate) -> RepoResult<Vec<Record>> {
        let Some(yesterday) = today.pred_opt() else {
            return Ok(Vec::new());
        };
        let filter = ListFilter::new()
            .one_of("status", OPEN_TASK_STATUSES.iter().copied())
            .range("deadline", None, Some(FieldValue::Date(yesterday)));
        self.records.collect_all(tenant, &filter)
    }
}
