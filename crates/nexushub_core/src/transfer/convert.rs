//! Cell text <-> typed value conversion for import and export.
//!
//! # Invariants
//! - Blank cells convert to `Null` for every kind.
//! - Text cells keep surrounding whitespace; other kinds ignore it.
//! - Only year-first dates are accepted; day/month order is never guessed.
//! - `format_cell` output parses back to the same value with `parse_cell`.

use crate::schema::validate::FieldErrorKind;
use crate::schema::value::{FieldKind, FieldValue, DATE_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use uuid::Uuid;

const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMATS_HINT: &str = "expected YYYY-MM-DD, YYYY/MM/DD or YYYYMMDD";

/// Parses one cell into a value of `kind`.
///
/// # Errors
/// Returns `FieldErrorKind::InvalidValue` naming the expected format.
pub fn parse_cell(
    kind: FieldKind,
    raw: &str,
    tag_delimiter: char,
) -> Result<FieldValue, FieldErrorKind> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }

    match kind {
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Integer => text
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| invalid(format!("`{text}` is not an integer"))),
        FieldKind::Decimal => match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(FieldValue::Decimal(value)),
            _ => Err(invalid(format!("`{text}` is not a decimal number"))),
        },
        FieldKind::Boolean => parse_bool(text)
            .map(FieldValue::Boolean)
            .ok_or_else(|| invalid(format!("`{text}` is not a boolean (true/false/yes/no/1/0)"))),
        FieldKind::Date => parse_date(text)
            .map(FieldValue::Date)
            .ok_or_else(|| invalid(format!("`{text}` is not a valid date; {DATE_FORMATS_HINT}"))),
        FieldKind::DateTime => parse_datetime(text)
            .map(FieldValue::DateTime)
            .ok_or_else(|| {
                invalid(format!(
                    "`{text}` is not a valid datetime; expected RFC 3339 or YYYY-MM-DD HH:MM:SS"
                ))
            }),
        FieldKind::Uuid => Uuid::parse_str(text)
            .map(FieldValue::Uuid)
            .map_err(|_| invalid(format!("`{text}` is not a valid uuid"))),
        FieldKind::Tags => {
            let value = FieldValue::tags(text.split(tag_delimiter));
            match value.as_tags() {
                Some(tags) if !tags.is_empty() => Ok(value),
                _ => Ok(FieldValue::Null),
            }
        }
    }
}

/// Formats one value as cell text.
pub fn format_cell(value: &FieldValue, tag_delimiter: char) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Integer(number) => number.to_string(),
        FieldValue::Decimal(number) => number.to_string(),
        FieldValue::Boolean(flag) => flag.to_string(),
        FieldValue::Date(date) => date.format(DATE_FORMAT).to_string(),
        FieldValue::DateTime(millis) => Utc
            .timestamp_millis_opt(*millis)
            .single()
            .map(|instant| instant.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| millis.to_string()),
        FieldValue::Uuid(id) => id.to_string(),
        FieldValue::Tags(tags) => tags.join(&tag_delimiter.to_string()),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `YYYYMMDD` only.
fn parse_date(text: &str) -> Option<NaiveDate> {
    if !text.is_ascii() {
        return None;
    }
    let (year, month, day) = match text.len() {
        8 => (&text[0..4], &text[4..6], &text[6..8]),
        10 => {
            let separator = text.as_bytes()[4];
            if !matches!(separator, b'-' | b'/') || text.as_bytes()[7] != separator {
                return None;
            }
            (&text[0..4], &text[5..7], &text[8..10])
        }
        _ => return None,
    };
    if ![year, month, day]
        .iter()
        .all(|part| part.bytes().all(|byte| byte.is_ascii_digit()))
    {
        return None;
    }
    NaiveDate::from_ymd_opt(
        year.parse().ok()?,
        month.parse().ok()?,
        day.parse().ok()?,
    )
}

fn parse_datetime(text: &str) -> Option<i64> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(text, NAIVE_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn invalid(message: String) -> FieldErrorKind {
    FieldErrorKind::InvalidValue(message)
}

#[cfg(test)]
mod tests {
    use super::{format_cell, parse_cell};
    use crate::schema::validate::FieldErrorKind;
    use crate::schema::value::{FieldKind, FieldValue};
    use chrono::NaiveDate;

    #[test]
    fn dates_accept_only_year_first_forms() {
        let expected = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        for raw in ["2024-03-04", "2024/03/04", "20240304", " 2024-03-04 "] {
            assert_eq!(parse_cell(FieldKind::Date, raw, ';').unwrap(), expected);
        }

        for raw in ["03/04/2024", "04.03.2024", "2024-3-4", "2024-03/04", "2024-02-30"] {
            assert!(matches!(
                parse_cell(FieldKind::Date, raw, ';'),
                Err(FieldErrorKind::InvalidValue(_))
            ));
        }
    }

    #[test]
    fn datetimes_accept_rfc3339_and_naive_utc() {
        let rfc = parse_cell(FieldKind::DateTime, "2024-03-04T10:00:00Z", ';').unwrap();
        let naive = parse_cell(FieldKind::DateTime, "2024-03-04 10:00:00", ';').unwrap();
        assert_eq!(rfc, naive);
        assert_eq!(format_cell(&rfc, ';'), "2024-03-04T10:00:00.000Z");
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(
            parse_cell(FieldKind::Boolean, "Yes", ';').unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            parse_cell(FieldKind::Boolean, "0", ';').unwrap(),
            FieldValue::Boolean(false)
        );
        assert!(parse_cell(FieldKind::Boolean, "maybe", ';').is_err());
    }

    #[test]
    fn tags_split_on_delimiter_and_normalize() {
        let value = parse_cell(FieldKind::Tags, "VIP; partner ;vip", ';').unwrap();
        assert_eq!(value, FieldValue::tags(["partner", "vip"]));
        assert_eq!(format_cell(&value, '|'), "partner|vip");
        assert_eq!(parse_cell(FieldKind::Tags, " ; ", ';').unwrap(), FieldValue::Null);
    }

    #[test]
    fn numbers_reject_garbage_and_blank_is_null() {
        assert!(parse_cell(FieldKind::Integer, "12.5", ';').is_err());
        assert!(parse_cell(FieldKind::Decimal, "NaN", ';').is_err());
        assert_eq!(
            parse_cell(FieldKind::Decimal, "12.5", ';').unwrap(),
            FieldValue::Decimal(12.5)
        );
        assert_eq!(parse_cell(FieldKind::Integer, "  ", ';').unwrap(), FieldValue::Null);
    }

    #[test]
    fn text_keeps_surrounding_whitespace() {
        assert_eq!(
            parse_cell(FieldKind::Text, "  indented note ", ';').unwrap(),
            FieldValue::from("  indented note ")
        );
        assert_eq!(parse_cell(FieldKind::Text, "   ", ';').unwrap(), FieldValue::Null);
    }
}
