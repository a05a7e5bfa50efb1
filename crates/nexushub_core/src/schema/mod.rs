//! Entity schema descriptors.
//!
//! # Responsibility
//! - Declare, per entity type, the field set, create-time requirements,
//!   per-tenant uniqueness, filterable predicates, export order and default
//!   sort.
//! - Drive the generic repository and the import/export layer entirely from
//!   static data; adding an entity never adds repository logic.
//!
//! # Invariants
//! - Descriptors are `'static` and immutable.
//! - Every name referenced by filters, export order or sort is a declared
//!   field (see [`EntitySchema::check`]).

pub mod registry;
pub mod validate;
pub mod value;

use std::collections::HashSet;

pub use validate::{FieldError, FieldErrorKind, ValidationError};
pub use value::{FieldKind, FieldValue};

/// Extra value rule applied after type coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Text must equal one of the listed values.
    Choices(&'static [&'static str]),
    /// Text must look like `local@domain.tld`.
    Email,
    /// Text length in characters must not exceed the bound.
    MaxLen(usize),
    /// Numeric value must fall in the inclusive range.
    IntRange(i64, i64),
}

/// Value applied on create when the caller omits the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    Integer(i64),
    Boolean(bool),
}

impl DefaultValue {
    pub fn to_value(self) -> FieldValue {
        match self {
            Self::Text(value) => FieldValue::Text(value.to_string()),
            Self::Integer(value) => FieldValue::Integer(value),
            Self::Boolean(value) => FieldValue::Boolean(value),
        }
    }
}

/// One declared entity field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present (non-null) on create and can never be cleared.
    pub required: bool,
    /// Unique among the tenant's active records of the same entity.
    pub unique: bool,
    /// Further fields that qualify uniqueness; the value must be unique only
    /// among records sharing these field values.
    pub unique_scope: &'static [&'static str],
    pub rule: Option<FieldRule>,
    pub default: Option<DefaultValue>,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            unique: false,
            unique_scope: &[],
            rule: None,
            default: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub const fn decimal(name: &'static str) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub const fn uuid(name: &'static str) -> Self {
        Self::new(name, FieldKind::Uuid)
    }

    pub const fn tags(name: &'static str) -> Self {
        Self::new(name, FieldKind::Tags)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Unique per combination with the `scope` field values.
    pub const fn unique_within(mut self, scope: &'static [&'static str]) -> Self {
        self.unique = true;
        self.unique_scope = scope;
        self
    }

    pub const fn rule(mut self, rule: FieldRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub const fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// Predicate family a field may be filtered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// `Eq` and `OneOf`; on tag fields this means membership.
    Equality,
    /// Inclusive bounds on ordered kinds.
    Range,
    /// Case-insensitive substring on text fields.
    Substring,
}

/// One declared filterable predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDef {
    pub field: &'static str,
    pub kind: FilterKind,
}

impl FilterDef {
    pub const fn equality(field: &'static str) -> Self {
        Self {
            field,
            kind: FilterKind::Equality,
        }
    }

    pub const fn range(field: &'static str) -> Self {
        Self {
            field,
            kind: FilterKind::Range,
        }
    }

    pub const fn substring(field: &'static str) -> Self {
        Self {
            field,
            kind: FilterKind::Substring,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    UpdatedAt,
    Field(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Default list ordering; ties are always broken by record id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const NEWEST_FIRST: Self = Self {
        key: SortKey::CreatedAt,
        direction: SortDirection::Desc,
    };

    pub const OLDEST_FIRST: Self = Self {
        key: SortKey::CreatedAt,
        direction: SortDirection::Asc,
    };

    pub const fn by_field(field: &'static str, direction: SortDirection) -> Self {
        Self {
            key: SortKey::Field(field),
            direction,
        }
    }
}

/// Static descriptor of one business entity.
#[derive(Debug)]
pub struct EntitySchema {
    /// Entity discriminator stored with every row, e.g. `company`.
    pub entity: &'static str,
    pub fields: &'static [FieldDef],
    pub filters: &'static [FilterDef],
    /// Canonical CSV column order.
    pub export_fields: &'static [&'static str],
    pub default_sort: SortSpec,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|def| def.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|def| def.required)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|def| def.unique)
    }

    /// Returns whether `field` is declared for the given predicate family.
    pub fn allows_filter(&self, field: &str, kind: FilterKind) -> bool {
        self.filters
            .iter()
            .any(|filter| filter.field == field && filter.kind == kind)
    }

    /// Fields covered by free-text `search`.
    pub fn search_fields(&self) -> impl Iterator<Item = &'static str> {
        self.filters
            .iter()
            .filter(|filter| filter.kind == FilterKind::Substring)
            .map(|filter| filter.field)
    }

    /// Exportable field definitions in canonical order.
    pub fn export_defs(&self) -> impl Iterator<Item = &'static FieldDef> + '_ {
        self.export_fields
            .iter()
            .filter_map(move |name| self.field(name))
    }

    /// Verifies the descriptor is internally consistent.
    ///
    /// # Errors
    /// Returns a message naming the first inconsistency found.
    pub fn check(&self) -> Result<(), String> {
        let entity = self.entity;
        if entity.is_empty() {
            return Err("entity name cannot be empty".to_string());
        }

        let mut seen = HashSet::new();
        for def in self.fields {
            if !is_field_name(def.name) {
                return Err(format!("{entity}: invalid field name `{}`", def.name));
            }
            if !seen.insert(def.name) {
                return Err(format!("{entity}: duplicate field `{}`", def.name));
            }
            if def.unique && def.kind == FieldKind::Tags {
                return Err(format!(
                    "{entity}: tag field `{}` cannot be unique",
                    def.name
                ));
            }
            for scope in def.unique_scope {
                match self.field(scope) {
                    Some(scoped) if scoped.kind != FieldKind::Tags && scoped.name != def.name => {}
                    _ => {
                        return Err(format!(
                            "{entity}: invalid uniqueness scope `{scope}` for `{}`",
                            def.name
                        ))
                    }
                }
            }
            if let Some(rule) = def.rule {
                check_rule(entity, def, rule)?;
            }
            if let Some(default) = def.default {
                let matches_kind = matches!(
                    (default, def.kind),
                    (DefaultValue::Text(_), FieldKind::Text)
                        | (DefaultValue::Integer(_), FieldKind::Integer)
                        | (DefaultValue::Integer(_), FieldKind::Decimal)
                        | (DefaultValue::Boolean(_), FieldKind::Boolean)
                );
                if !matches_kind {
                    return Err(format!(
                        "{entity}: default for `{}` does not match kind {}",
                        def.name, def.kind
                    ));
                }
            }
        }

        for filter in self.filters {
            let Some(def) = self.field(filter.field) else {
                return Err(format!(
                    "{entity}: filter references unknown field `{}`",
                    filter.field
                ));
            };
            let supported = match filter.kind {
                FilterKind::Equality => true,
                FilterKind::Range => def.kind.is_ordered(),
                FilterKind::Substring => def.kind == FieldKind::Text,
            };
            if !supported {
                return Err(format!(
                    "{entity}: {:?} filter is not supported on {} field `{}`",
                    filter.kind, def.kind, def.name
                ));
            }
        }

        let mut exported = HashSet::new();
        for name in self.export_fields {
            if self.field(name).is_none() {
                return Err(format!("{entity}: export references unknown field `{name}`"));
            }
            if !exported.insert(*name) {
                return Err(format!("{entity}: field `{name}` exported twice"));
            }
        }

        if let SortKey::Field(name) = self.default_sort.key {
            match self.field(name) {
                Some(def) if def.kind != FieldKind::Tags => {}
                Some(_) => return Err(format!("{entity}: cannot sort by tag field `{name}`")),
                None => return Err(format!("{entity}: sort references unknown field `{name}`")),
            }
        }

        Ok(())
    }
}

fn check_rule(entity: &str, def: &FieldDef, rule: FieldRule) -> Result<(), String> {
    let supported = match rule {
        FieldRule::Choices(values) => def.kind == FieldKind::Text && !values.is_empty(),
        FieldRule::Email | FieldRule::MaxLen(_) => def.kind == FieldKind::Text,
        FieldRule::IntRange(min, max) => {
            matches!(def.kind, FieldKind::Integer | FieldKind::Decimal) && min <= max
        }
    };
    if supported {
        Ok(())
    } else {
        Err(format!(
            "{entity}: rule {rule:?} is not applicable to {} field `{}`",
            def.kind, def.name
        ))
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{EntitySchema, FieldDef, FieldRule, FilterDef, SortSpec};

    static BROKEN_FILTER: EntitySchema = EntitySchema {
        entity: "broken",
        fields: &[FieldDef::text("name"), FieldDef::tags("tags")],
        filters: &[FilterDef::range("name")],
        export_fields: &["name"],
        default_sort: SortSpec::NEWEST_FIRST,
    };

    static BROKEN_EXPORT: EntitySchema = EntitySchema {
        entity: "broken",
        fields: &[FieldDef::text("name")],
        filters: &[],
        export_fields: &["name", "missing"],
        default_sort: SortSpec::NEWEST_FIRST,
    };

    static BROKEN_SCOPE: EntitySchema = EntitySchema {
        entity: "broken",
        fields: &[
            FieldDef::text("code").unique_within(&["group", "labels"]),
            FieldDef::text("group"),
            FieldDef::tags("labels"),
        ],
        filters: &[],
        export_fields: &[],
        default_sort: SortSpec::NEWEST_FIRST,
    };

    static BROKEN_RULE: EntitySchema = EntitySchema {
        entity: "broken",
        fields: &[FieldDef::integer("rank").rule(FieldRule::Email)],
        filters: &[],
        export_fields: &[],
        default_sort: SortSpec::NEWEST_FIRST,
    };

    #[test]
    fn check_rejects_range_filter_on_text() {
        let err = BROKEN_FILTER.check().unwrap_err();
        assert!(err.contains("not supported"));
    }

    #[test]
    fn check_rejects_unknown_export_field() {
        let err = BROKEN_EXPORT.check().unwrap_err();
        assert!(err.contains("missing"));
    }

    #[test]
    fn check_rejects_rule_on_wrong_kind() {
        let err = BROKEN_RULE.check().unwrap_err();
        assert!(err.contains("rank"));
    }

    #[test]
    fn check_rejects_tag_field_in_uniqueness_scope() {
        let err = BROKEN_SCOPE.check().unwrap_err();
        assert!(err.contains("labels"));
    }

    #[test]
    fn builder_flags_compose() {
        let def = FieldDef::text("email")
            .required()
            .unique()
            .rule(FieldRule::Email);
        assert!(def.required);
        assert!(def.unique);
        assert_eq!(def.rule, Some(FieldRule::Email));

        let scoped = FieldDef::text("field_name").unique_within(&["entity_type"]);
        assert!(scoped.unique);
        assert_eq!(scoped.unique_scope, &["entity_type"]);
    }
}
