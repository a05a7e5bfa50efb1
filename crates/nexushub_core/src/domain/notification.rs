//! Notification descriptor and read-state handling.

use crate::fields;
use crate::model::record::{now_epoch_ms, Record, RecordId, TenantId};
use crate::repo::{
    BulkItem, BulkResult, ListFilter, Page, Pagination, RecordRepository, RepoResult,
};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FieldValue, FilterDef, SortSpec,
};
use uuid::Uuid;

pub const NOTIFICATION_TYPES: &[&str] = &[
    "mention",
    "comment",
    "task_assigned",
    "task_completed",
    "project_update",
    "team_invite",
    "system",
];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "notification",
    fields: &[
        FieldDef::text("type")
            .required()
            .rule(FieldRule::Choices(NOTIFICATION_TYPES)),
        FieldDef::text("title")
            .required()
            .rule(FieldRule::MaxLen(255)),
        FieldDef::text("message").required(),
        FieldDef::uuid("user_id").required(),
        FieldDef::text("entity_type").rule(FieldRule::MaxLen(50)),
        FieldDef::uuid("entity_id"),
        FieldDef::uuid("actor_id"),
        FieldDef::boolean("is_read").default_value(DefaultValue::Boolean(false)),
        FieldDef::datetime("read_at"),
        FieldDef::tags("channels"),
        FieldDef::integer("priority")
            .rule(FieldRule::IntRange(1, 5))
            .default_value(DefaultValue::Integer(3)),
    ],
    filters: &[
        FilterDef::equality("user_id"),
        FilterDef::equality("is_read"),
        FilterDef::equality("type"),
        FilterDef::equality("entity_type"),
        FilterDef::equality("entity_id"),
        FilterDef::range("priority"),
    ],
    export_fields: &[
        "type",
        "title",
        "message",
        "user_id",
        "entity_type",
        "entity_id",
        "actor_id",
        "is_read",
        "priority",
        "channels",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

entity_repository!(
    /// Per-user notifications of one tenant.
    NotificationRepository,
    SCHEMA
);

impl NotificationRepository<'_> {
    /// Notifications addressed to `user_id`, newest first.
    pub fn for_user(
        &self,
        tenant: TenantId,
        user_id: Uuid,
        unread_only: bool,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        self.records
            .list(tenant, &user_filter(user_id, unread_only), pagination)
    }

    pub fn unread_count(&self, tenant: TenantId, user_id: Uuid) -> RepoResult<u64> {
        self.records.count(tenant, &user_filter(user_id, true))
    }

    /// Marks each notification read, stamping `read_at`.
    ///
    /// A notification addressed to another user is reported as not found.
    pub fn mark_as_read(&self, tenant: TenantId, user_id: Uuid, ids: &[RecordId]) -> BulkResult {
        let read_at = now_epoch_ms();
        let items = ids
            .iter()
            .map(|&id| {
                let result = self.mark_one(tenant, user_id, id, read_at);
                BulkItem::from_result(id, &result)
            })
            .collect();
        let result = BulkResult { items };
        log::info!(
            "event=notification_mark_read module=domain status=ok entity=notification succeeded={} failed={}",
            result.succeeded(),
            result.failed()
        );
        result
    }

    fn mark_one(
        &self,
        tenant: TenantId,
        user_id: Uuid,
        id: RecordId,
        read_at: i64,
    ) -> RepoResult<Record> {
        self.records.update_where(
            tenant,
            id,
            fields! {
                "is_read" => true,
                "read_at" => FieldValue::DateTime(read_at),
            },
            |current| current.uuid("user_id") == Some(user_id),
        )
    }
}

fn user_filter(user_id: Uuid, unread_only: bool) -> ListFilter {
    let filter = ListFilter::new().eq("user_id", user_id);
    if unread_only {
        filter.eq("is_read", false)
    } else {
        filter
    }
}
