//! Team descriptor and membership queries.

use crate::model::record::{Record, TenantId};
use crate::repo::{ListFilter, Page, Pagination, RecordRepository, RepoResult};
use crate::schema::{DefaultValue, EntitySchema, FieldDef, FieldRule, FilterDef, SortSpec};
use uuid::Uuid;

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "team",
    fields: &[
        FieldDef::text("name")
            .required()
            .rule(FieldRule::MaxLen(255)),
        FieldDef::text("description"),
        FieldDef::boolean("is_default").default_value(DefaultValue::Boolean(false)),
        FieldDef::boolean("is_private").default_value(DefaultValue::Boolean(false)),
        FieldDef::text("color").rule(FieldRule::MaxLen(7)),
        FieldDef::tags("tags"),
        FieldDef::uuid("owner_id"),
        // Member user ids, stored as tag values.
        FieldDef::tags("member_ids"),
    ],
    filters: &[
        FilterDef::equality("owner_id"),
        FilterDef::equality("is_default"),
        FilterDef::equality("is_private"),
        FilterDef::equality("tags"),
        FilterDef::equality("member_ids"),
        FilterDef::substring("name"),
        FilterDef::substring("description"),
    ],
    export_fields: &[
        "name",
        "description",
        "is_default",
        "is_private",
        "color",
        "owner_id",
        "member_ids",
        "tags",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

entity_repository!(
    /// Teams of one tenant.
    TeamRepository,
    SCHEMA
);

impl TeamRepository<'_> {
    pub fn by_owner(
        &self,
        tenant: TenantId,
        owner_id: Uuid,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &ListFilter::new().eq("owner_id", owner_id), pagination)
    }

    /// Active teams listing `user_id` as a member.
    pub fn for_member(&self, tenant: TenantId, user_id: Uuid) -> RepoResult<Vec<Record>> {
        self.records.collect_all(
            tenant,
            &ListFilter::new().eq("member_ids", user_id.to_string()),
        )
    }
}
