//! Comment descriptor and thread queries.

use crate::model::record::{Record, RecordId, TenantId};
use crate::repo::{ListFilter, Page, Pagination, RecordRepository, RepoResult};
use crate::schema::{DefaultValue, EntitySchema, FieldDef, FieldValue, FilterDef, SortSpec};
use uuid::Uuid;

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "comment",
    fields: &[
        FieldDef::text("content").required(),
        FieldDef::text("content_html"),
        FieldDef::text("entity_type").required(),
        FieldDef::uuid("entity_id").required(),
        FieldDef::uuid("author_id").required(),
        FieldDef::uuid("parent_id"),
        FieldDef::tags("mentions"),
        FieldDef::boolean("is_edited").default_value(DefaultValue::Boolean(false)),
        FieldDef::datetime("edited_at"),
    ],
    filters: &[
        FilterDef::equality("entity_type"),
        FilterDef::equality("entity_id"),
        FilterDef::equality("parent_id"),
        FilterDef::equality("author_id"),
        FilterDef::equality("mentions"),
        FilterDef::substring("content"),
    ],
    export_fields: &[
        "entity_type",
        "entity_id",
        "author_id",
        "parent_id",
        "content",
        "mentions",
    ],
    default_sort: SortSpec::OLDEST_FIRST,
};

entity_repository!(
    /// Threaded comments attached to other records of one tenant.
    CommentRepository,
    SCHEMA
);

impl CommentRepository<'_> {
    /// Top-level comments on one record, oldest first.
    pub fn for_entity(
        &self,
        tenant: TenantId,
        entity_type: &str,
        entity_id: RecordId,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        let filter = ListFilter::new()
            .eq("entity_type", entity_type)
            .eq("entity_id", entity_id)
            .eq("parent_id", FieldValue::Null);
        self.records.list(tenant, &filter, pagination)
    }

    pub fn replies(
        &self,
        tenant: TenantId,
        parent_id: RecordId,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &ListFilter::new().eq("parent_id", parent_id), pagination)
    }

    pub fn by_author(
        &self,
        tenant: TenantId,
        author_id: Uuid,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &ListFilter::new().eq("author_id", author_id), pagination)
    }
}
