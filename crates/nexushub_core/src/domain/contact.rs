//! Contact descriptor and duplicate detection.

use crate::model::record::{Record, TenantId};
use crate::repo::{ListFilter, Pagination, RecordRepository, RepoResult};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FilterDef, SortSpec,
};
use std::collections::HashSet;

pub const CONTACT_STATUSES: &[&str] = &["active", "inactive", "bounced", "unsubscribed"];
pub const LEAD_STATUSES: &[&str] = &["new", "contacted", "qualified", "lost"];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "contact",
    fields: &[
        FieldDef::text("first_name")
            .required()
            .rule(FieldRule::MaxLen(100)),
        FieldDef::text("last_name")
            .required()
            .rule(FieldRule::MaxLen(100)),
        FieldDef::text("title").rule(FieldRule::MaxLen(200)),
        FieldDef::text("department").rule(FieldRule::MaxLen(100)),
        FieldDef::uuid("company_id"),
        FieldDef::uuid("reports_to_id"),
        FieldDef::text("email").unique().rule(FieldRule::Email),
        FieldDef::text("phone").rule(FieldRule::MaxLen(50)),
        FieldDef::text("mobile").rule(FieldRule::MaxLen(50)),
        FieldDef::text("city").rule(FieldRule::MaxLen(100)),
        FieldDef::text("country").rule(FieldRule::MaxLen(2)),
        FieldDef::text("status")
            .rule(FieldRule::Choices(CONTACT_STATUSES))
            .default_value(DefaultValue::Text("active")),
        FieldDef::text("lead_status").rule(FieldRule::Choices(LEAD_STATUSES)),
        FieldDef::text("lead_source").rule(FieldRule::MaxLen(100)),
        FieldDef::integer("rating").rule(FieldRule::IntRange(1, 5)),
        FieldDef::boolean("do_not_contact").default_value(DefaultValue::Boolean(false)),
        FieldDef::date("birthday"),
        FieldDef::datetime("last_contacted_at"),
        FieldDef::uuid("owner_id"),
        FieldDef::tags("tags"),
        FieldDef::text("notes"),
    ],
    filters: &[
        FilterDef::equality("company_id"),
        FilterDef::equality("status"),
        FilterDef::equality("lead_status"),
        FilterDef::equality("owner_id"),
        FilterDef::equality("email"),
        FilterDef::equality("phone"),
        FilterDef::equality("tags"),
        FilterDef::range("rating"),
        FilterDef::range("birthday"),
        FilterDef::substring("first_name"),
        FilterDef::substring("last_name"),
        FilterDef::substring("email"),
        FilterDef::substring("phone"),
    ],
    export_fields: &[
        "first_name",
        "last_name",
        "email",
        "phone",
        "mobile",
        "title",
        "department",
        "status",
        "lead_status",
        "lead_source",
        "rating",
        "do_not_contact",
        "birthday",
        "city",
        "country",
        "tags",
        "notes",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

entity_repository!(
    /// Contacts of one tenant.
    ContactRepository,
    SCHEMA
);

impl ContactRepository<'_> {
    /// Active contact holding exactly `email`.
    pub fn find_by_email(&self, tenant: TenantId, email: &str) -> RepoResult<Option<Record>> {
        let page = self.records.list(
            tenant,
            &ListFilter::new().eq("email", email.trim()),
            Pagination::first(1),
        )?;
        Ok(page.items.into_iter().next())
    }

    /// Active contacts sharing the email or the phone number.
    ///
    /// Email matches come first; a contact matching both appears once.
    /// Returns nothing when neither value is given.
    pub fn find_duplicates(
        &self,
        tenant: TenantId,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> RepoResult<Vec<Record>> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for (field, value) in [("email", email), ("phone", phone)] {
            let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
                continue;
            };
            for record in self
                .records
                .collect_all(tenant, &ListFilter::new().eq(field, value))?
            {
                if seen.insert(record.id) {
                    matches.push(record);
                }
            }
        }
        Ok(matches)
    }
}
