//! Soft-delete record store over the `records` table.
//!
//! # Responsibility
//! - Own every SQL statement that touches `records`.
//! - Decode rows into [`Record`]s using the owning descriptor.
//!
//! # Invariants
//! - Every statement is scoped by `entity` and `tenant_id`; there is no
//!   unscoped read or write path.
//! - No statement removes rows; deletion flips the tombstone columns.
//! - Timestamps written here never precede `created_at`.

use crate::model::record::{FieldMap, Record, RecordId, TenantId};
use crate::repo::error::{RepoError, RepoResult};
use crate::schema::value::FieldValue;
use crate::schema::EntitySchema;
use crate::store::filter_sql::{json_path, order_clause, sql_value, CompiledFilter};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    uuid,
    tenant_id,
    fields,
    is_deleted,
    deleted_at,
    created_at,
    updated_at
FROM records";

/// Row-level access to one entity's records.
pub struct RecordStore<'conn> {
    conn: &'conn Connection,
    schema: &'static EntitySchema,
}

impl<'conn> RecordStore<'conn> {
    pub fn new(conn: &'conn Connection, schema: &'static EntitySchema) -> Self {
        Self { conn, schema }
    }

    pub fn insert(&self, record: &Record) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO records (
                uuid,
                entity,
                tenant_id,
                fields,
                is_deleted,
                deleted_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                record.id.to_string(),
                self.schema.entity,
                record.tenant_id.to_string(),
                encode_fields(&record.fields),
                bool_to_int(record.is_deleted),
                record.deleted_at,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Loads one record of `tenant`; tombstones only when `include_deleted`.
    pub fn load(
        &self,
        tenant: TenantId,
        id: RecordId,
        include_deleted: bool,
    ) -> RepoResult<Option<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE entity = ?1
               AND tenant_id = ?2
               AND uuid = ?3
               AND (?4 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![
            self.schema.entity,
            tenant.to_string(),
            id.to_string(),
            bool_to_int(include_deleted),
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.parse_row(row)?));
        }
        Ok(None)
    }

    /// Returns whether `id` exists for `tenant`, tombstones included.
    pub fn exists(&self, tenant: TenantId, id: RecordId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM records
                WHERE entity = ?1
                  AND tenant_id = ?2
                  AND uuid = ?3
            );",
            params![self.schema.entity, tenant.to_string(), id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Replaces the field document of an active record.
    ///
    /// Returns `false` when no active row matched.
    pub fn write_fields(
        &self,
        tenant: TenantId,
        id: RecordId,
        fields: &FieldMap,
        now: i64,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                fields = ?1,
                updated_at = MAX(?2, created_at)
             WHERE entity = ?3
               AND tenant_id = ?4
               AND uuid = ?5
               AND is_deleted = 0;",
            params![
                encode_fields(fields),
                now,
                self.schema.entity,
                tenant.to_string(),
                id.to_string(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Tombstones an active record. Returns `false` when none matched.
    pub fn mark_deleted(&self, tenant: TenantId, id: RecordId, now: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                is_deleted = 1,
                deleted_at = ?1,
                updated_at = MAX(?1, created_at)
             WHERE entity = ?2
               AND tenant_id = ?3
               AND uuid = ?4
               AND is_deleted = 0;",
            params![now, self.schema.entity, tenant.to_string(), id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Clears the tombstone of a deleted record. Returns `false` when none
    /// matched.
    pub fn clear_tombstone(&self, tenant: TenantId, id: RecordId, now: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                is_deleted = 0,
                deleted_at = NULL,
                updated_at = MAX(?1, created_at)
             WHERE entity = ?2
               AND tenant_id = ?3
               AND uuid = ?4
               AND is_deleted = 1;",
            params![now, self.schema.entity, tenant.to_string(), id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Finds an active record of `tenant` already holding `value` in `field`.
    ///
    /// `scope` narrows the match to records that also hold the same values in
    /// the listed fields; an absent scope value only matches absent values.
    pub fn find_conflict(
        &self,
        tenant: TenantId,
        field: &str,
        value: &FieldValue,
        scope: &[(&str, Option<&FieldValue>)],
        exclude: Option<RecordId>,
    ) -> RepoResult<Option<RecordId>> {
        if value.is_null() {
            return Ok(None);
        }

        let mut sql = String::from(
            "SELECT uuid
             FROM records
             WHERE entity = ?
               AND tenant_id = ?
               AND is_deleted = 0
               AND uuid <> ?
               AND json_extract(fields, ?) = ?",
        );
        let mut binds = vec![
            Value::Text(self.schema.entity.to_string()),
            Value::Text(tenant.to_string()),
            Value::Text(exclude.map(|id| id.to_string()).unwrap_or_default()),
            Value::Text(json_path(field)),
            sql_value(value),
        ];
        for (name, scoped) in scope {
            binds.push(Value::Text(json_path(name)));
            match scoped.filter(|value| !value.is_null()) {
                Some(scoped) => {
                    sql.push_str(" AND json_extract(fields, ?) = ?");
                    binds.push(sql_value(scoped));
                }
                None => sql.push_str(" AND json_extract(fields, ?) IS NULL"),
            }
        }
        sql.push_str(" ORDER BY created_at ASC, uuid ASC LIMIT 1;");

        let found: Option<String> = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))
            .optional()?;

        found.map(|text| parse_uuid(&text, "uuid")).transpose()
    }

    /// Selects one page of records matching `filter`, in descriptor order.
    pub fn select(
        &self,
        tenant: TenantId,
        filter: &CompiledFilter,
        limit: u32,
        offset: u32,
    ) -> RepoResult<Vec<Record>> {
        let (where_sql, mut binds) = self.scoped_where(tenant, filter);
        let (order_sql, order_binds) = order_clause(self.schema);
        let sql = format!("{RECORD_SELECT_SQL}{where_sql}{order_sql} LIMIT ? OFFSET ?;");
        binds.extend(order_binds);
        binds.push(Value::Integer(i64::from(limit)));
        binds.push(Value::Integer(i64::from(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.parse_row(row)?);
        }
        Ok(records)
    }

    /// Counts records matching `filter`, ignoring pagination.
    pub fn count(&self, tenant: TenantId, filter: &CompiledFilter) -> RepoResult<u64> {
        let (where_sql, binds) = self.scoped_where(tenant, filter);
        let sql = format!("SELECT COUNT(*) FROM records{where_sql};");
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative record count {total}")))
    }

    fn scoped_where(&self, tenant: TenantId, filter: &CompiledFilter) -> (String, Vec<Value>) {
        let mut sql = String::from(" WHERE entity = ? AND tenant_id = ?");
        let mut binds = vec![
            Value::Text(self.schema.entity.to_string()),
            Value::Text(tenant.to_string()),
        ];
        if !filter.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        for clause in &filter.clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        binds.extend(filter.binds.iter().cloned());
        (sql, binds)
    }

    fn parse_row(&self, row: &Row<'_>) -> RepoResult<Record> {
        let uuid_text: String = row.get("uuid")?;
        let id = parse_uuid(&uuid_text, "uuid")?;
        let tenant_text: String = row.get("tenant_id")?;
        let tenant_id = TenantId::new(parse_uuid(&tenant_text, "tenant_id")?);

        let fields_text: String = row.get("fields")?;
        let fields = self.decode_fields(id, &fields_text)?;

        let is_deleted = match row.get::<_, i64>("is_deleted")? {
            0 => false,
            1 => true,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid is_deleted value `{other}` in records.is_deleted"
                )));
            }
        };

        let record = Record {
            id,
            tenant_id,
            entity: self.schema.entity,
            fields,
            is_deleted,
            deleted_at: row.get("deleted_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        };
        record.check_lifecycle().map_err(RepoError::InvalidData)?;
        Ok(record)
    }

    fn decode_fields(&self, id: RecordId, raw: &str) -> RepoResult<FieldMap> {
        let document: JsonValue = serde_json::from_str(raw).map_err(|err| {
            RepoError::InvalidData(format!("record {id} has malformed fields json: {err}"))
        })?;
        let JsonValue::Object(entries) = document else {
            return Err(RepoError::InvalidData(format!(
                "record {id} fields is not a json object"
            )));
        };

        let mut fields = FieldMap::new();
        for (name, stored) in entries {
            let def = self.schema.field(&name).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "record {id} has undeclared {} field `{name}`",
                    self.schema.entity
                ))
            })?;
            let value = FieldValue::from_storage(def.kind, &stored).map_err(|message| {
                RepoError::InvalidData(format!("record {id} field `{name}`: {message}"))
            })?;
            if !value.is_null() {
                fields.insert(name, value);
            }
        }
        Ok(fields)
    }
}

fn encode_fields(fields: &FieldMap) -> String {
    let document: Map<String, JsonValue> = fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| (name.clone(), value.to_storage()))
        .collect();
    JsonValue::Object(document).to_string()
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in records.{column}"))
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
