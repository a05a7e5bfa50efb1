//! Company descriptor and queries.

use crate::model::record::{Record, RecordId, TenantId};
use crate::repo::{ListFilter, RecordRepository, RepoResult};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FilterDef, SortSpec,
};

pub const COMPANY_STATUSES: &[&str] = &["lead", "active", "inactive", "lost"];
pub const COMPANY_TYPES: &[&str] = &["prospect", "customer", "partner", "competitor"];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "company",
    fields: &[
        FieldDef::text("name")
            .required()
            .rule(FieldRule::MaxLen(255)),
        FieldDef::text("legal_name").rule(FieldRule::MaxLen(255)),
        FieldDef::text("industry").rule(FieldRule::MaxLen(100)),
        FieldDef::text("company_size").rule(FieldRule::MaxLen(50)),
        FieldDef::text("type").rule(FieldRule::Choices(COMPANY_TYPES)),
        FieldDef::text("status")
            .rule(FieldRule::Choices(COMPANY_STATUSES))
            .default_value(DefaultValue::Text("active")),
        FieldDef::text("website").rule(FieldRule::MaxLen(500)),
        FieldDef::text("email").rule(FieldRule::Email),
        FieldDef::text("phone").rule(FieldRule::MaxLen(50)),
        FieldDef::text("city").rule(FieldRule::MaxLen(100)),
        FieldDef::text("country").rule(FieldRule::MaxLen(2)),
        FieldDef::decimal("annual_revenue"),
        FieldDef::integer("employee_count").rule(FieldRule::IntRange(0, i64::MAX)),
        FieldDef::uuid("parent_company_id"),
        FieldDef::uuid("owner_id"),
        FieldDef::tags("tags"),
        FieldDef::text("source").rule(FieldRule::MaxLen(100)),
        FieldDef::text("notes"),
    ],
    filters: &[
        FilterDef::equality("industry"),
        FilterDef::equality("status"),
        FilterDef::equality("type"),
        FilterDef::equality("owner_id"),
        FilterDef::equality("parent_company_id"),
        FilterDef::equality("tags"),
        FilterDef::range("employee_count"),
        FilterDef::range("annual_revenue"),
        FilterDef::substring("name"),
        FilterDef::substring("legal_name"),
        FilterDef::substring("email"),
    ],
    export_fields: &[
        "name",
        "legal_name",
        "industry",
        "company_size",
        "type",
        "status",
        "website",
        "email",
        "phone",
        "city",
        "country",
        "annual_revenue",
        "employee_count",
        "tags",
        "source",
        "notes",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

entity_repository!(
    /// Companies of one tenant, including the subsidiary hierarchy.
    CompanyRepository,
    SCHEMA
);

impl CompanyRepository<'_> {
    /// Active companies whose parent is `parent_id`.
    pub fn subsidiaries(&self, tenant: TenantId, parent_id: RecordId) -> RepoResult<Vec<Record>> {
        self.records
            .collect_all(tenant, &ListFilter::new().eq("parent_company_id", parent_id))
    }

    /// Active companies in `status`; `None` counts all of them.
    pub fn count_by_status(&self, tenant: TenantId, status: Option<&str>) -> RepoResult<u64> {
        let filter = match status {
            Some(status) => ListFilter::new().eq("status", status),
            None => ListFilter::new(),
        };
        self.records.count(tenant, &filter)
    }
}
