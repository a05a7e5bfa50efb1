//! Field-level validation driven by entity descriptors.
//!
//! # Responsibility
//! - Turn caller-provided field maps into normalized, typed maps.
//! - Report every offending field by name in one [`ValidationError`].
//!
//! # Invariants
//! - Validated maps never contain `Null` values; absence means unset.
//! - Uniqueness is not checked here; it needs storage and lives in the
//!   repository.

use crate::model::record::FieldMap;
use crate::schema::value::{CoerceError, FieldValue};
use crate::schema::{EntitySchema, FieldDef, FieldRule};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Why one field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Required field absent, null or blank.
    Missing,
    /// Another active record of the tenant holds the same value.
    Duplicate,
    /// Field is not declared by the descriptor.
    UnknownField,
    /// Value kind differs from the declared kind.
    TypeMismatch(String),
    /// Value could not be parsed or is out of its domain.
    InvalidValue(String),
    /// Value violates the declared field rule.
    RuleViolation(String),
}

impl Display for FieldErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => f.write_str("is required"),
            Self::Duplicate => f.write_str("must be unique"),
            Self::UnknownField => f.write_str("is not a known field"),
            Self::TypeMismatch(message)
            | Self::InvalidValue(message)
            | Self::RuleViolation(message) => f.write_str(message),
        }
    }
}

/// One named field failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    #[serde(rename = "error")]
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` {}", self.field, self.kind)
    }
}

/// Non-empty list of field failures for one record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            errors: vec![FieldError::new(field, kind)],
        }
    }

    /// Offending field names in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|error| error.field.as_str()).collect()
    }

    /// Returns the failure kind recorded for `field`, if any.
    pub fn kind_of(&self, field: &str) -> Option<&FieldErrorKind> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| &error.kind)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("validation failed: ")?;
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}

/// Outcome of merging a partial update onto stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFields {
    pub fields: FieldMap,
    /// Unique fields whose value, or one of whose scope values, differs from
    /// the stored one.
    pub changed_unique: Vec<&'static FieldDef>,
}

/// Validates a create payload and applies declared defaults.
///
/// # Errors
/// Returns every unknown, mistyped, rule-violating or missing field.
pub fn validate_create(
    schema: &EntitySchema,
    input: FieldMap,
    tag_delimiter: char,
) -> Result<FieldMap, ValidationError> {
    let mut errors = Vec::new();
    let mut fields = FieldMap::new();

    for (name, value) in input {
        let Some(def) = schema.field(&name) else {
            errors.push(FieldError::new(name, FieldErrorKind::UnknownField));
            continue;
        };
        match check_value(def, value, tag_delimiter) {
            Ok(FieldValue::Null) => {}
            Ok(value) => {
                fields.insert(name, value);
            }
            Err(kind) => errors.push(FieldError::new(name, kind)),
        }
    }

    for def in schema.fields {
        if fields.contains_key(def.name) || errors.iter().any(|e| e.field == def.name) {
            continue;
        }
        if let Some(default) = def.default {
            match check_value(def, default.to_value(), tag_delimiter) {
                Ok(value) => {
                    fields.insert(def.name.to_string(), value);
                }
                Err(kind) => errors.push(FieldError::new(def.name, kind)),
            }
        } else if def.required {
            errors.push(FieldError::new(def.name, FieldErrorKind::Missing));
        }
    }

    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(ValidationError { errors })
    }
}

/// Validates a partial update and merges it onto `current`.
///
/// `Null` in the patch clears the field; clearing a required field fails.
///
/// # Errors
/// Returns every unknown, mistyped, rule-violating or cleared-required field.
pub fn validate_patch(
    schema: &EntitySchema,
    current: &FieldMap,
    patch: FieldMap,
    tag_delimiter: char,
) -> Result<MergedFields, ValidationError> {
    let mut errors = Vec::new();
    let mut fields = current.clone();

    for (name, value) in patch {
        let Some(def) = schema.field(&name) else {
            errors.push(FieldError::new(name, FieldErrorKind::UnknownField));
            continue;
        };
        match check_value(def, value, tag_delimiter) {
            Ok(FieldValue::Null) if def.required => {
                errors.push(FieldError::new(name, FieldErrorKind::Missing));
            }
            Ok(FieldValue::Null) => {
                fields.remove(&name);
            }
            Ok(value) => {
                fields.insert(name, value);
            }
            Err(kind) => errors.push(FieldError::new(name, kind)),
        }
    }

    if !errors.is_empty() {
        return Err(ValidationError { errors });
    }

    let changed_unique = schema
        .unique_fields()
        .filter(|def| {
            std::iter::once(def.name)
                .chain(def.unique_scope.iter().copied())
                .any(|name| fields.get(name) != current.get(name))
        })
        .collect();

    Ok(MergedFields {
        fields,
        changed_unique,
    })
}

/// Coerces one value to its declared kind and applies the field rule.
///
/// Tags may not contain `tag_delimiter`; they could not be told apart from
/// two tags once joined into a CSV cell.
pub fn check_value(
    def: &FieldDef,
    value: FieldValue,
    tag_delimiter: char,
) -> Result<FieldValue, FieldErrorKind> {
    let value = value.coerce(def.kind).map_err(|err| match err {
        CoerceError::TypeMismatch { .. } => FieldErrorKind::TypeMismatch(err.to_string()),
        CoerceError::Invalid(message) => FieldErrorKind::InvalidValue(message),
    })?;

    if value.is_null() {
        return Ok(value);
    }

    if let Some(tag) = value
        .as_tags()
        .and_then(|tags| tags.iter().find(|tag| tag.contains(tag_delimiter)))
    {
        return Err(FieldErrorKind::InvalidValue(format!(
            "tag `{tag}` contains the tag delimiter `{tag_delimiter}`"
        )));
    }

    if let Some(rule) = def.rule {
        check_rule(rule, &value)?;
    }

    Ok(value)
}

fn check_rule(rule: FieldRule, value: &FieldValue) -> Result<(), FieldErrorKind> {
    match rule {
        FieldRule::Choices(choices) => {
            let text = value.as_text().unwrap_or_default();
            if choices.contains(&text) {
                Ok(())
            } else {
                Err(FieldErrorKind::RuleViolation(format!(
                    "must be one of: {}",
                    choices.join(", ")
                )))
            }
        }
        FieldRule::Email => {
            let text = value.as_text().unwrap_or_default();
            if EMAIL_PATTERN.is_match(text) {
                Ok(())
            } else {
                Err(FieldErrorKind::RuleViolation(
                    "must be a valid email address".to_string(),
                ))
            }
        }
        FieldRule::MaxLen(max) => {
            let length = value.as_text().map_or(0, |text| text.chars().count());
            if length <= max {
                Ok(())
            } else {
                Err(FieldErrorKind::RuleViolation(format!(
                    "must be at most {max} characters"
                )))
            }
        }
        FieldRule::IntRange(min, max) => {
            let number = value.as_decimal().unwrap_or_default();
            if number >= min as f64 && number <= max as f64 {
                Ok(())
            } else {
                Err(FieldErrorKind::RuleViolation(format!(
                    "must be between {min} and {max}"
                )))
            }
        }
    }
}
