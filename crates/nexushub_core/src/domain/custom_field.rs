//! Custom field definitions attached to other entity types.

use crate::model::record::{Record, TenantId};
use crate::repo::{ListFilter, RecordRepository, RepoResult};
use crate::schema::{DefaultValue, EntitySchema, FieldDef, FieldRule, FilterDef, SortDirection, SortSpec};

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "custom_field",
    fields: &[
        FieldDef::text("entity_type")
            .required()
            .rule(FieldRule::MaxLen(50)),
        FieldDef::text("field_name")
            .required()
            .unique_within(&["entity_type"])
            .rule(FieldRule::MaxLen(100)),
        FieldDef::text("field_label")
            .required()
            .rule(FieldRule::MaxLen(200)),
        FieldDef::text("field_type")
            .required()
            .rule(FieldRule::MaxLen(50)),
        FieldDef::boolean("is_required").default_value(DefaultValue::Boolean(false)),
        FieldDef::boolean("is_unique").default_value(DefaultValue::Boolean(false)),
        FieldDef::tags("options"),
        FieldDef::text("default_value").rule(FieldRule::MaxLen(255)),
        FieldDef::integer("position").default_value(DefaultValue::Integer(0)),
        FieldDef::text("help_text"),
        FieldDef::text("placeholder").rule(FieldRule::MaxLen(255)),
        FieldDef::boolean("is_active").default_value(DefaultValue::Boolean(true)),
        FieldDef::uuid("created_by_id"),
    ],
    filters: &[
        FilterDef::equality("entity_type"),
        FilterDef::equality("field_name"),
        FilterDef::equality("field_type"),
        FilterDef::equality("is_active"),
        FilterDef::substring("field_label"),
    ],
    export_fields: &[
        "entity_type",
        "field_name",
        "field_label",
        "field_type",
        "is_required",
        "is_unique",
        "options",
        "default_value",
        "position",
        "help_text",
        "placeholder",
        "is_active",
    ],
    default_sort: SortSpec::by_field("position", SortDirection::Asc),
};

entity_repository!(
    /// Custom field definitions of one tenant.
    CustomFieldRepository,
    SCHEMA
);

impl CustomFieldRepository<'_> {
    /// Definitions for `entity_type` in display order; inactive ones only
    /// when `active_only` is false.
    pub fn by_entity_type(
        &self,
        tenant: TenantId,
        entity_type: &str,
        active_only: bool,
    ) -> RepoResult<Vec<Record>> {
        let mut filter = ListFilter::new().eq("entity_type", entity_type);
        if active_only {
            filter = filter.eq("is_active", true);
        }
        self.records.collect_all(tenant, &filter)
    }
}
