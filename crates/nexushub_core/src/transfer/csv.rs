//! Minimal RFC 4180 reader and writer.
//!
//! # Invariants
//! - Input may use LF or CRLF line endings and may start with a UTF-8 BOM.
//! - Output always uses LF and quotes only cells that need it.
//! - Quoted cells keep embedded separators and line breaks verbatim.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Document-level CSV syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvError {
    /// 1-based physical line where the problem starts.
    pub line: usize,
    pub message: String,
}

impl CsvError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl Display for CsvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "csv line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

/// One data record and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Parsed document: trimmed header names plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDocument {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// Parses a CSV document whose first non-blank record is the header.
///
/// Blank lines are skipped. Cell-count mismatches are not errors here; the
/// caller decides how to report them per row.
///
/// # Errors
/// Returns `CsvError` for broken quoting, a missing header, or empty or
/// duplicate header names.
pub fn parse(text: &str) -> Result<CsvDocument, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = parse_records(text)?.into_iter();

    let Some(header) = records.next() else {
        return Err(CsvError::new(1, "missing header row"));
    };

    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(header.cells.len());
    for (position, raw) in header.cells.into_iter().enumerate() {
        let name = raw.trim().to_string();
        if name.is_empty() {
            return Err(CsvError::new(
                header.line,
                format!("empty column name at position {}", position + 1),
            ));
        }
        if !seen.insert(name.clone()) {
            return Err(CsvError::new(
                header.line,
                format!("duplicate column `{name}`"),
            ));
        }
        headers.push(name);
    }

    Ok(CsvDocument {
        headers,
        rows: records.collect(),
    })
}

fn parse_records(text: &str) -> Result<Vec<CsvRow>, CsvError> {
    let mut records = Vec::new();
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut line = 1_usize;
    let mut record_line = 1_usize;
    let mut quote_line = 1_usize;
    let mut in_quotes = false;
    let mut closed_quote = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => {
                    in_quotes = false;
                    closed_quote = true;
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    line += 1;
                    cell.push('\n');
                }
                '\n' => {
                    line += 1;
                    cell.push('\n');
                }
                other => cell.push(other),
            }
            continue;
        }

        match ch {
            ',' => {
                cells.push(std::mem::take(&mut cell));
                closed_quote = false;
            }
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                cells.push(std::mem::take(&mut cell));
                closed_quote = false;
                push_record(&mut records, record_line, std::mem::take(&mut cells));
                line += 1;
                record_line = line;
            }
            _ if closed_quote => {
                return Err(CsvError::new(
                    line,
                    "unexpected character after closing quote",
                ));
            }
            '"' if cell.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            '"' => return Err(CsvError::new(line, "unexpected quote in unquoted cell")),
            other => cell.push(other),
        }
    }

    if in_quotes {
        return Err(CsvError::new(quote_line, "unterminated quoted cell"));
    }
    if !cell.is_empty() || closed_quote || !cells.is_empty() {
        cells.push(cell);
        push_record(&mut records, record_line, cells);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<CsvRow>, line: usize, cells: Vec<String>) {
    let blank = cells.len() == 1 && cells[0].trim().is_empty();
    if !blank {
        records.push(CsvRow { line, cells });
    }
}

/// Quotes `cell` when it contains a separator, quote or line break, or
/// starts or ends with whitespace.
pub fn escape_cell(cell: &str) -> Cow<'_, str> {
    let padded = cell.trim() != cell;
    if padded || cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

/// Appends one LF-terminated record to `out`.
pub fn write_record<S: AsRef<str>>(out: &mut String, cells: &[S]) {
    for (index, cell) in cells.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape_cell(cell.as_ref()));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::{escape_cell, parse, write_record};

    #[test]
    fn parses_quoted_cells_with_separators_and_line_breaks() {
        let doc = parse("name,notes\r\n\"Acme, Inc.\",\"said \"\"hi\"\"\nthen left\"\r\n").unwrap();
        assert_eq!(doc.headers, vec!["name", "notes"]);
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(doc.rows[0].cells[0], "Acme, Inc.");
        assert_eq!(doc.rows[0].cells[1], "said \"hi\"\nthen left");
    }

    #[test]
    fn skips_blank_lines_and_bom_and_tracks_lines() {
        let doc = parse("\u{feff}name\n\nAcme\n\nGlobex").unwrap();
        assert_eq!(doc.headers, vec!["name"]);
        let lines: Vec<usize> = doc.rows.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![3, 5]);
    }

    #[test]
    fn keeps_trailing_empty_cells() {
        let doc = parse("a,b,c\n1,,\n").unwrap();
        assert_eq!(doc.rows[0].cells, vec!["1", "", ""]);
    }

    #[test]
    fn rejects_unterminated_quote_with_start_line() {
        let err = parse("name\nok\n\"broken\nstill broken\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn rejects_stray_quote_inside_unquoted_cell() {
        let err = parse("name\nAc\"me\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn rejects_duplicate_and_missing_headers() {
        assert!(parse("name,name\nA,B\n").is_err());
        assert_eq!(parse("").unwrap_err().line, 1);
    }

    #[test]
    fn writer_quotes_only_when_needed() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("a,b"), "\"a,b\"");
        assert_eq!(escape_cell("say \"x\""), "\"say \"\"x\"\"\"");
        assert_eq!(escape_cell(" padded "), "\" padded \"");

        let mut out = String::new();
        write_record(&mut out, &["Acme, Inc.", "lead"]);
        assert_eq!(out, "\"Acme, Inc.\",lead\n");
    }
}
