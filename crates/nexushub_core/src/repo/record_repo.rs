//! Generic record repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide tenant-scoped CRUD, soft delete, restore and bulk mutation for
//!   any entity described by an [`EntitySchema`].
//! - Enforce descriptor validation and per-tenant uniqueness on every write.
//!
//! # Invariants
//! - Every operation takes the tenant explicitly; there is no unscoped path.
//! - Absent, tombstoned and foreign-tenant records all surface as
//!   `RepoError::NotFound`.
//! - Each single mutation runs in one immediate transaction, or inside the
//!   caller's transaction when one is already open.
//! - Bulk operations never abort: one outcome per requested id, input order.

use crate::config::RepoConfig;
use crate::db::migrations::latest_version;
use crate::model::record::{now_epoch_ms, FieldMap, Record, RecordId, TenantId};
use crate::repo::bulk::{BulkItem, BulkResult};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{ListFilter, Page, Pagination};
use crate::schema::validate::{validate_create, validate_patch, FieldError, FieldErrorKind};
use crate::schema::{EntitySchema, FieldDef, ValidationError};
use crate::store::{compile_filter, RecordStore};
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;
use uuid::Uuid;

const RECORD_COLUMNS: &[&str] = &[
    "uuid",
    "entity",
    "tenant_id",
    "fields",
    "is_deleted",
    "deleted_at",
    "created_at",
    "updated_at",
];

/// Repository interface shared by every entity type.
pub trait RecordRepository {
    /// Descriptor this repository validates against.
    fn schema(&self) -> &'static EntitySchema;
    fn config(&self) -> &RepoConfig;

    /// Validates `fields` and stores a new active record.
    fn create(&self, tenant: TenantId, fields: FieldMap) -> RepoResult<Record>;
    /// Loads one record; tombstones only when `include_deleted`.
    fn get(&self, tenant: TenantId, id: RecordId, include_deleted: bool) -> RepoResult<Record>;
    /// Lists one page of records matching `filter`.
    fn list(
        &self,
        tenant: TenantId,
        filter: &ListFilter,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>>;
    fn count(&self, tenant: TenantId, filter: &ListFilter) -> RepoResult<u64>;
    /// Merges `patch` onto an active record. `Null` clears a field.
    fn update(&self, tenant: TenantId, id: RecordId, patch: FieldMap) -> RepoResult<Record>;
    /// Tombstones a record. Deleting a tombstone is a no-op success.
    fn soft_delete(&self, tenant: TenantId, id: RecordId) -> RepoResult<()>;
    /// Clears a tombstone after re-checking uniqueness.
    fn restore(&self, tenant: TenantId, id: RecordId) -> RepoResult<Record>;
    fn bulk_update(&self, tenant: TenantId, ids: &[RecordId], patch: &FieldMap) -> BulkResult;
    fn bulk_delete(&self, tenant: TenantId, ids: &[RecordId]) -> BulkResult;

    /// Fetches every matching record page by page.
    fn collect_all(&self, tenant: TenantId, filter: &ListFilter) -> RepoResult<Vec<Record>> {
        let batch = self.config().fetch_batch_size();
        let mut records = Vec::new();
        let mut offset = 0_u32;
        loop {
            let page = self.list(tenant, filter, Pagination::new(batch, offset))?;
            let fetched = page.items.len() as u32;
            let has_more = page.has_more();
            records.extend(page.items);
            if fetched == 0 || !has_more {
                return Ok(records);
            }
            offset = offset.saturating_add(fetched);
        }
    }
}

/// SQLite-backed repository for one entity descriptor.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
    schema: &'static EntitySchema,
    config: RepoConfig,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Creates a repository with default configuration from a migrated
    /// connection.
    pub fn try_new(conn: &'conn Connection, schema: &'static EntitySchema) -> RepoResult<Self> {
        Self::with_config(conn, schema, RepoConfig::default())
    }

    /// Creates a repository with explicit configuration.
    ///
    /// # Errors
    /// - `InvalidSchema` when the descriptor is inconsistent.
    /// - `InvalidConfig` when `config` breaks its invariants.
    /// - `UninitializedConnection`/`MissingRequired*` for unmigrated storage.
    pub fn with_config(
        conn: &'conn Connection,
        schema: &'static EntitySchema,
        config: RepoConfig,
    ) -> RepoResult<Self> {
        schema.check().map_err(RepoError::InvalidSchema)?;
        config.validate()?;
        ensure_records_connection_ready(conn)?;
        Ok(Self {
            conn,
            schema,
            config,
        })
    }

    /// Like `update`, but only when `accept` holds for the stored record.
    ///
    /// The check and the write share one transaction. A rejected record is
    /// reported as `NotFound`, like any record outside the caller's reach.
    pub fn update_where(
        &self,
        tenant: TenantId,
        id: RecordId,
        patch: FieldMap,
        accept: impl FnOnce(&Record) -> bool,
    ) -> RepoResult<Record> {
        let record = self.in_write_tx(|store| {
            let current = store
                .load(tenant, id, false)?
                .filter(accept)
                .ok_or(RepoError::NotFound(id))?;
            let merged = validate_patch(
                self.schema,
                &current.fields,
                patch,
                self.config.tag_delimiter,
            )?;

            let errors = self.uniqueness_errors(
                store,
                tenant,
                &merged.fields,
                merged.changed_unique.iter().copied(),
                Some(id),
            )?;
            if !errors.is_empty() {
                return Err(ValidationError { errors }.into());
            }

            let now = now_epoch_ms();
            if !store.write_fields(tenant, id, &merged.fields, now)? {
                return Err(RepoError::NotFound(id));
            }
            Ok(Record {
                fields: merged.fields,
                updated_at: now.max(current.created_at),
                ..current
            })
        })?;

        debug!(
            "event=record_update module=repo status=ok entity={} id={}",
            self.schema.entity, id
        );
        Ok(record)
    }

    fn store(&self) -> RecordStore<'conn> {
        RecordStore::new(self.conn, self.schema)
    }

    fn in_write_tx<T>(&self, op: impl FnOnce(&RecordStore<'conn>) -> RepoResult<T>) -> RepoResult<T> {
        let store = self.store();
        if !self.conn.is_autocommit() {
            return op(&store);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = op(&store)?;
        tx.commit()?;
        Ok(value)
    }

    fn uniqueness_errors<'a>(
        &self,
        store: &RecordStore<'_>,
        tenant: TenantId,
        fields: &FieldMap,
        candidates: impl IntoIterator<Item = &'a FieldDef>,
        exclude: Option<RecordId>,
    ) -> RepoResult<Vec<FieldError>> {
        let mut errors = Vec::new();
        for def in candidates {
            let Some(value) = fields.get(def.name) else {
                continue;
            };
            let scope: Vec<_> = def
                .unique_scope
                .iter()
                .map(|name| (*name, fields.get(*name)))
                .collect();
            if store
                .find_conflict(tenant, def.name, value, &scope, exclude)?
                .is_some()
            {
                errors.push(FieldError::new(def.name, FieldErrorKind::Duplicate));
            }
        }
        Ok(errors)
    }

    fn log_bulk(&self, op: &str, result: &BulkResult, started_at: Instant) {
        let failed = result.failed();
        let message = format!(
            "event=record_bulk module=repo status={} op={} entity={} requested={} succeeded={} failed={} duration_ms={}",
            if failed == 0 { "ok" } else { "partial" },
            op,
            self.schema.entity,
            result.items.len(),
            result.succeeded(),
            failed,
            started_at.elapsed().as_millis()
        );
        if failed == 0 {
            info!("{message}");
        } else {
            warn!("{message}");
        }
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    fn config(&self) -> &RepoConfig {
        &self.config
    }

    fn create(&self, tenant: TenantId, fields: FieldMap) -> RepoResult<Record> {
        let fields = validate_create(self.schema, fields, self.config.tag_delimiter)?;

        let record = self.in_write_tx(|store| {
            let errors =
                self.uniqueness_errors(store, tenant, &fields, self.schema.unique_fields(), None)?;
            if !errors.is_empty() {
                return Err(ValidationError { errors }.into());
            }

            let now = now_epoch_ms();
            let record = Record {
                id: Uuid::new_v4(),
                tenant_id: tenant,
                entity: self.schema.entity,
                fields,
                is_deleted: false,
                deleted_at: None,
                created_at: now,
                updated_at: now,
            };
            store.insert(&record)?;
            Ok(record)
        })?;

        debug!(
            "event=record_create module=repo status=ok entity={} id={}",
            self.schema.entity, record.id
        );
        Ok(record)
    }

    fn get(&self, tenant: TenantId, id: RecordId, include_deleted: bool) -> RepoResult<Record> {
        self.store()
            .load(tenant, id, include_deleted)?
            .ok_or(RepoError::NotFound(id))
    }

    fn list(
        &self,
        tenant: TenantId,
        filter: &ListFilter,
        pagination: Pagination,
    ) -> RepoResult<Page<Record>> {
        let compiled = compile_filter(self.schema, filter)?;
        let limit = self.config.normalize_limit(pagination.limit);
        let store = self.store();
        let items = store.select(tenant, &compiled, limit, pagination.offset)?;
        let total_count = store.count(tenant, &compiled)?;
        Ok(Page {
            items,
            total_count,
            limit,
            offset: pagination.offset,
        })
    }

    fn count(&self, tenant: TenantId, filter: &ListFilter) -> RepoResult<u64> {
        let compiled = compile_filter(self.schema, filter)?;
        self.store().count(tenant, &compiled)
    }

    fn update(&self, tenant: TenantId, id: RecordId, patch: FieldMap) -> RepoResult<Record> {
        self.update_where(tenant, id, patch, |_| true)
    }

    fn soft_delete(&self, tenant: TenantId, id: RecordId) -> RepoResult<()> {
        let changed = self.in_write_tx(|store| {
            let current = store
                .load(tenant, id, true)?
                .ok_or(RepoError::NotFound(id))?;
            if current.is_deleted {
                return Ok(false);
            }
            store.mark_deleted(tenant, id, now_epoch_ms())
        })?;

        debug!(
            "event=record_soft_delete module=repo status=ok entity={} id={} changed={}",
            self.schema.entity, id, changed
        );
        Ok(())
    }

    fn restore(&self, tenant: TenantId, id: RecordId) -> RepoResult<Record> {
        let record = self.in_write_tx(|store| {
            let current = store
                .load(tenant, id, true)?
                .ok_or(RepoError::NotFound(id))?;
            if current.is_active() {
                return Ok(current);
            }

            let errors = self.uniqueness_errors(
                store,
                tenant,
                &current.fields,
                self.schema.unique_fields(),
                Some(id),
            )?;
            if !errors.is_empty() {
                return Err(ValidationError { errors }.into());
            }

            let now = now_epoch_ms();
            if !store.clear_tombstone(tenant, id, now)? {
                return Err(RepoError::NotFound(id));
            }
            Ok(Record {
                is_deleted: false,
                deleted_at: None,
                updated_at: now.max(current.created_at),
                ..current
            })
        })?;

        debug!(
            "event=record_restore module=repo status=ok entity={} id={}",
            self.schema.entity, id
        );
        Ok(record)
    }

    fn bulk_update(&self, tenant: TenantId, ids: &[RecordId], patch: &FieldMap) -> BulkResult {
        let started_at = Instant::now();
        let items = ids
            .iter()
            .map(|id| BulkItem::from_result(*id, &self.update(tenant, *id, patch.clone())))
            .collect();
        let result = BulkResult { items };
        self.log_bulk("update", &result, started_at);
        result
    }

    fn bulk_delete(&self, tenant: TenantId, ids: &[RecordId]) -> BulkResult {
        let started_at = Instant::now();
        let items = ids
            .iter()
            .map(|id| BulkItem::from_result(*id, &self.soft_delete(tenant, *id)))
            .collect();
        let result = BulkResult { items };
        self.log_bulk("delete", &result, started_at);
        result
    }
}

fn ensure_records_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "records")? {
        return Err(RepoError::MissingRequiredTable("records"));
    }

    for &column in RECORD_COLUMNS {
        if !table_has_column(conn, "records", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "records",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
