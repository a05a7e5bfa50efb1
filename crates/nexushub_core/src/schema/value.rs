//! Typed field values and their storage encoding.
//!
//! # Responsibility
//! - Define the closed set of field kinds an entity descriptor may declare.
//! - Convert values to and from the JSON document stored in `records.fields`.
//!
//! # Invariants
//! - `Null` is the only representation of an absent value.
//! - Empty text and non-finite decimals never reach storage.
//! - Tag sets are lowercase, deduplicated and sorted.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Number, Value as JsonValue};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Storage and export format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value type declared for one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    /// Calendar date without time zone.
    Date,
    /// UTC instant in epoch milliseconds.
    DateTime,
    /// Reference to another record, or any external identifier.
    Uuid,
    /// Multi-value label set.
    Tags,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
            Self::Tags => "tags",
        }
    }

    /// Returns whether values of this kind have a meaningful `<`/`>` order.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Decimal | Self::Date | Self::DateTime
        )
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed field value.
///
/// Serialized untagged so the routing layer sees plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    /// Epoch milliseconds, UTC.
    DateTime(i64),
    Uuid(Uuid),
    Tags(Vec<String>),
}

impl FieldValue {
    /// Builds a normalized tag set.
    pub fn tags<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Tags(normalize_tags(values))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Kind of a non-null value.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(FieldKind::Text),
            Self::Integer(_) => Some(FieldKind::Integer),
            Self::Decimal(_) => Some(FieldKind::Decimal),
            Self::Boolean(_) => Some(FieldKind::Boolean),
            Self::Date(_) => Some(FieldKind::Date),
            Self::DateTime(_) => Some(FieldKind::DateTime),
            Self::Uuid(_) => Some(FieldKind::Uuid),
            Self::Tags(_) => Some(FieldKind::Tags),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<i64> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_tags(&self) -> Option<&[String]> {
        match self {
            Self::Tags(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Coerces a caller-provided value into the declared field kind.
    ///
    /// Only lossless widening is accepted (`Integer` into `Decimal`); every
    /// other kind mismatch is reported instead of guessed.
    ///
    /// # Errors
    /// - `CoerceError::TypeMismatch` when the value kind differs.
    /// - `CoerceError::Invalid` for non-finite decimals.
    pub fn coerce(self, kind: FieldKind) -> Result<Self, CoerceError> {
        match (kind, self) {
            (_, Self::Null) => Ok(Self::Null),
            (FieldKind::Text, Self::Text(value)) => {
                if value.trim().is_empty() {
                    Ok(Self::Null)
                } else {
                    Ok(Self::Text(value))
                }
            }
            (FieldKind::Integer, value @ Self::Integer(_)) => Ok(value),
            (FieldKind::Decimal, Self::Integer(value)) => Ok(Self::Decimal(value as f64)),
            (FieldKind::Decimal, Self::Decimal(value)) => {
                if value.is_finite() {
                    Ok(Self::Decimal(value))
                } else {
                    Err(CoerceError::Invalid(
                        "decimal value must be finite".to_string(),
                    ))
                }
            }
            (FieldKind::Boolean, value @ Self::Boolean(_)) => Ok(value),
            (FieldKind::Date, value @ Self::Date(_)) => Ok(value),
            (FieldKind::DateTime, value @ Self::DateTime(_)) => Ok(value),
            (FieldKind::Uuid, value @ Self::Uuid(_)) => Ok(value),
            (FieldKind::Tags, Self::Tags(values)) => {
                let normalized = normalize_tags(values);
                if normalized.is_empty() {
                    Ok(Self::Null)
                } else {
                    Ok(Self::Tags(normalized))
                }
            }
            (expected, other) => Err(CoerceError::TypeMismatch {
                expected,
                actual: other.kind(),
            }),
        }
    }

    /// Encodes the value for the JSON `fields` column.
    pub fn to_storage(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Text(value) => JsonValue::String(value.clone()),
            Self::Integer(value) => JsonValue::Number(Number::from(*value)),
            Self::Decimal(value) => Number::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Boolean(value) => JsonValue::Bool(*value),
            Self::Date(value) => JsonValue::String(value.format(DATE_FORMAT).to_string()),
            Self::DateTime(value) => JsonValue::Number(Number::from(*value)),
            Self::Uuid(value) => JsonValue::String(value.to_string()),
            Self::Tags(values) => {
                JsonValue::Array(values.iter().cloned().map(JsonValue::String).collect())
            }
        }
    }

    /// Decodes a stored JSON value using the declared field kind.
    ///
    /// Returns a human-readable message when persisted data does not match
    /// the descriptor; callers wrap it as invalid persisted data.
    pub fn from_storage(kind: FieldKind, value: &JsonValue) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Self::Null);
        }

        let decoded = match kind {
            FieldKind::Text => value.as_str().map(|text| Self::Text(text.to_string())),
            FieldKind::Integer => value.as_i64().map(Self::Integer),
            FieldKind::Decimal => value.as_f64().map(Self::Decimal),
            FieldKind::Boolean => value.as_bool().map(Self::Boolean),
            FieldKind::Date => value
                .as_str()
                .and_then(|text| NaiveDate::parse_from_str(text, DATE_FORMAT).ok())
                .map(Self::Date),
            FieldKind::DateTime => value.as_i64().map(Self::DateTime),
            FieldKind::Uuid => value
                .as_str()
                .and_then(|text| Uuid::parse_str(text).ok())
                .map(Self::Uuid),
            FieldKind::Tags => value.as_array().and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(Self::Tags)
            }),
        };

        decoded.ok_or_else(|| format!("stored value `{value}` is not a valid {kind}"))
    }
}

/// Failure to coerce one value into a field kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    TypeMismatch {
        expected: FieldKind,
        actual: Option<FieldKind>,
    },
    Invalid(String),
}

impl Display for CoerceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                expected,
                actual: Some(actual),
            } => write!(f, "expected {expected} value, got {actual}"),
            Self::TypeMismatch {
                expected,
                actual: None,
            } => write!(f, "expected {expected} value"),
            Self::Invalid(message) => f.write_str(message),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Normalizes one tag value: trimmed and lowercased, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag.as_ref()) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}
