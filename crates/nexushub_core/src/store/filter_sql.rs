//! Compiles declared list filters into SQL predicates over `records.fields`.
//!
//! # Invariants
//! - Only predicates declared by the descriptor compile; everything else is
//!   `RepoError::InvalidFilter`.
//! - Values are always bound, never interpolated. JSON paths are built from
//!   descriptor field names, which `EntitySchema::check` restricts to
//!   `[a-z0-9_]`.
//! - Substring matching folds case with SQLite `lower()` on both operands,
//!   so stored text and needle are always folded alike (ASCII only).

use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{ListFilter, Predicate, PredicateOp};
use crate::schema::value::{normalize_tag, FieldValue, DATE_FORMAT};
use crate::schema::{EntitySchema, FieldDef, FieldKind, FilterKind, SortKey};
use rusqlite::types::Value;

const SUBSTRING_SQL: &str = "instr(lower(json_extract(fields, ?)), lower(?)) > 0";

/// SQL fragments for one compiled filter, without the tenant scope.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    pub clauses: Vec<String>,
    pub binds: Vec<Value>,
    pub include_deleted: bool,
}

/// Validates `filter` against `schema` and compiles it.
pub fn compile_filter(schema: &EntitySchema, filter: &ListFilter) -> RepoResult<CompiledFilter> {
    let mut compiled = CompiledFilter {
        include_deleted: filter.include_deleted,
        ..CompiledFilter::default()
    };

    for predicate in &filter.predicates {
        compile_predicate(schema, predicate, &mut compiled)?;
    }

    if let Some(text) = filter.search.as_deref() {
        compile_search(schema, text, &mut compiled)?;
    }

    Ok(compiled)
}

/// `ORDER BY` clause for the descriptor's default sort with id tie-break.
pub fn order_clause(schema: &EntitySchema) -> (String, Vec<Value>) {
    let direction = schema.default_sort.direction.as_sql();
    match schema.default_sort.key {
        SortKey::CreatedAt => (
            format!(" ORDER BY created_at {direction}, uuid ASC"),
            Vec::new(),
        ),
        SortKey::UpdatedAt => (
            format!(" ORDER BY updated_at {direction}, uuid ASC"),
            Vec::new(),
        ),
        SortKey::Field(name) => (
            format!(" ORDER BY json_extract(fields, ?) {direction}, uuid ASC"),
            vec![Value::Text(json_path(name))],
        ),
    }
}

/// Converts a typed value into its SQL comparison form.
///
/// Matches what `json_extract` returns for the stored encoding.
pub fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(text) => Value::Text(text.clone()),
        FieldValue::Integer(number) => Value::Integer(*number),
        FieldValue::Decimal(number) => Value::Real(*number),
        FieldValue::Boolean(flag) => Value::Integer(i64::from(*flag)),
        FieldValue::Date(date) => Value::Text(date.format(DATE_FORMAT).to_string()),
        FieldValue::DateTime(millis) => Value::Integer(*millis),
        FieldValue::Uuid(id) => Value::Text(id.to_string()),
        FieldValue::Tags(_) => Value::Text(value.to_storage().to_string()),
    }
}

pub fn json_path(field: &str) -> String {
    format!("$.{field}")
}

fn compile_predicate(
    schema: &EntitySchema,
    predicate: &Predicate,
    compiled: &mut CompiledFilter,
) -> RepoResult<()> {
    let field = predicate.field.as_str();
    let def = schema
        .field(field)
        .ok_or_else(|| RepoError::invalid_filter(field, "unknown field"))?;

    let family = match predicate.op {
        PredicateOp::Eq(_) | PredicateOp::OneOf(_) => FilterKind::Equality,
        PredicateOp::Range { .. } => FilterKind::Range,
        PredicateOp::Contains(_) => FilterKind::Substring,
    };
    if !schema.allows_filter(field, family) {
        return Err(RepoError::invalid_filter(
            field,
            format!("{family:?} filter is not declared for this field"),
        ));
    }

    let path = Value::Text(json_path(def.name));
    match &predicate.op {
        PredicateOp::Eq(value) if def.kind == FieldKind::Tags => {
            let tag = tag_operand(def, value)?;
            compiled.clauses.push(
                "EXISTS (SELECT 1 FROM json_each(records.fields, ?) AS tag WHERE tag.value = ?)"
                    .to_string(),
            );
            compiled.binds.extend([path, Value::Text(tag)]);
        }
        PredicateOp::Eq(value) => {
            let value = operand(def, value)?;
            if value.is_null() {
                compiled
                    .clauses
                    .push("json_extract(fields, ?) IS NULL".to_string());
                compiled.binds.push(path);
            } else {
                compiled.clauses.push("json_extract(fields, ?) = ?".to_string());
                compiled.binds.extend([path, sql_value(&value)]);
            }
        }
        PredicateOp::OneOf(values) => {
            if values.is_empty() {
                return Err(RepoError::invalid_filter(
                    field,
                    "one_of needs at least one value",
                ));
            }
            let mut binds = Vec::with_capacity(values.len());
            for value in values {
                if def.kind == FieldKind::Tags {
                    binds.push(Value::Text(tag_operand(def, value)?));
                } else {
                    let value = operand(def, value)?;
                    if value.is_null() {
                        return Err(RepoError::invalid_filter(
                            field,
                            "one_of cannot contain null",
                        ));
                    }
                    binds.push(sql_value(&value));
                }
            }
            let placeholders = vec!["?"; binds.len()].join(", ");
            let clause = if def.kind == FieldKind::Tags {
                format!(
                    "EXISTS (SELECT 1 FROM json_each(records.fields, ?) AS tag WHERE tag.value IN ({placeholders}))"
                )
            } else {
                format!("json_extract(fields, ?) IN ({placeholders})")
            };
            compiled.clauses.push(clause);
            compiled.binds.push(path);
            compiled.binds.extend(binds);
        }
        PredicateOp::Range { min, max } => {
            if min.is_none() && max.is_none() {
                return Err(RepoError::invalid_filter(
                    field,
                    "range needs a lower or upper bound",
                ));
            }
            for (bound, operator) in [(min, ">="), (max, "<=")] {
                let Some(bound) = bound else {
                    continue;
                };
                let bound = operand(def, bound)?;
                if bound.is_null() {
                    return Err(RepoError::invalid_filter(field, "range bound cannot be null"));
                }
                compiled
                    .clauses
                    .push(format!("json_extract(fields, ?) {operator} ?"));
                compiled.binds.extend([path.clone(), sql_value(&bound)]);
            }
        }
        PredicateOp::Contains(needle) => {
            let needle = needle.trim();
            if needle.is_empty() {
                return Err(RepoError::invalid_filter(field, "substring cannot be empty"));
            }
            compiled
                .clauses
                .push(SUBSTRING_SQL.to_string());
            compiled
                .binds
                .extend([path, Value::Text(needle.to_string())]);
        }
    }

    Ok(())
}

fn compile_search(
    schema: &EntitySchema,
    text: &str,
    compiled: &mut CompiledFilter,
) -> RepoResult<()> {
    let needle = text.trim();
    if needle.is_empty() {
        return Ok(());
    }

    let fields: Vec<&str> = schema.search_fields().collect();
    if fields.is_empty() {
        return Err(RepoError::invalid_filter(
            "search",
            format!("entity `{}` declares no searchable fields", schema.entity),
        ));
    }

    let alternatives = vec![SUBSTRING_SQL; fields.len()];
    compiled
        .clauses
        .push(format!("({})", alternatives.join(" OR ")));
    for field in fields {
        compiled.binds.push(Value::Text(json_path(field)));
        compiled.binds.push(Value::Text(needle.to_string()));
    }
    Ok(())
}

fn operand(def: &FieldDef, value: &FieldValue) -> RepoResult<FieldValue> {
    value
        .clone()
        .coerce(def.kind)
        .map_err(|err| RepoError::invalid_filter(def.name, err.to_string()))
}

fn tag_operand(def: &FieldDef, value: &FieldValue) -> RepoResult<String> {
    value
        .as_text()
        .and_then(normalize_tag)
        .ok_or_else(|| RepoError::invalid_filter(def.name, "tag filters take one non-empty tag"))
}

#[cfg(test)]
mod tests {
    use super::{compile_filter, order_clause};
    use crate::repo::error::RepoError;
    use crate::repo::query::ListFilter;
    use crate::schema::{
        EntitySchema, FieldDef, FieldValue, FilterDef, SortDirection, SortSpec,
    };
    use rusqlite::types::Value;

    static ITEM: EntitySchema = EntitySchema {
        entity: "item",
        fields: &[
            FieldDef::text("name"),
            FieldDef::text("status"),
            FieldDef::integer("rank"),
            FieldDef::tags("tags"),
        ],
        filters: &[
            FilterDef::equality("status"),
            FilterDef::equality("tags"),
            FilterDef::range("rank"),
            FilterDef::substring("name"),
        ],
        export_fields: &["name"],
        default_sort: SortSpec::by_field("rank", SortDirection::Asc),
    };

    #[test]
    fn undeclared_predicate_family_is_rejected() {
        let err = compile_filter(&ITEM, &ListFilter::new().contains("status", "op")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidFilter { ref field, .. } if field == "status"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = compile_filter(&ITEM, &ListFilter::new().eq("owner", "x")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidFilter { ref field, .. } if field == "owner"));
    }

    #[test]
    fn range_binds_both_bounds() {
        let compiled = compile_filter(
            &ITEM,
            &ListFilter::new().range(
                "rank",
                Some(FieldValue::Integer(1)),
                Some(FieldValue::Integer(3)),
            ),
        )
        .unwrap();
        assert_eq!(compiled.clauses.len(), 2);
        assert_eq!(compiled.binds[1], Value::Integer(1));
        assert_eq!(compiled.binds[3], Value::Integer(3));
    }

    #[test]
    fn range_value_of_wrong_kind_is_rejected() {
        let err = compile_filter(
            &ITEM,
            &ListFilter::new().range("rank", Some(FieldValue::from("high")), None),
        )
        .unwrap_err();
        assert!(matches!(err, RepoError::InvalidFilter { .. }));
    }

    #[test]
    fn tag_membership_is_normalized() {
        let compiled = compile_filter(&ITEM, &ListFilter::new().eq("tags", " VIP ")).unwrap();
        assert_eq!(compiled.binds[1], Value::Text("vip".to_string()));
    }

    #[test]
    fn substring_folds_needle_in_sql() {
        let compiled = compile_filter(&ITEM, &ListFilter::new().contains("name", " Müller ")).unwrap();
        assert!(compiled.clauses[0].contains("lower(?)"));
        assert_eq!(compiled.binds[1], Value::Text("Müller".to_string()));
    }

    #[test]
    fn blank_search_is_ignored() {
        let compiled = compile_filter(&ITEM, &ListFilter::new().search("   ")).unwrap();
        assert!(compiled.clauses.is_empty());
    }

    #[test]
    fn field_sort_binds_json_path() {
        let (sql, binds) = order_clause(&ITEM);
        assert!(sql.contains("ASC, uuid ASC"));
        assert_eq!(binds, vec![Value::Text("$.rank".to_string())]);
    }
}
