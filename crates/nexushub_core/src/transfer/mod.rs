//! CSV import/export over any record repository.
//!
//! # Responsibility
//! - Convert exportable fields between cell text and typed values.
//! - Import rows independently, collecting per-row failures.
//! - Export every matching record in the descriptor's canonical column order.
//!
//! # Invariants
//! - One bad row never aborts an import; only a malformed CSV document does.
//! - Row indexes are 1-based over data rows.
//! - Re-import always creates new records; it never merges by id.

pub mod convert;
pub mod csv;

use crate::model::record::{FieldMap, RecordId, TenantId};
use crate::repo::error::RepoError;
use crate::repo::query::ListFilter;
use crate::repo::record_repo::RecordRepository;
use crate::schema::validate::{validate_create, FieldError};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub use convert::{format_cell, parse_cell};
pub use csv::{CsvDocument, CsvError, CsvRow};

/// Error that stops a whole transfer.
#[derive(Debug)]
pub enum TransferError {
    /// Input is not a well-formed CSV document.
    Csv { line: usize, message: String },
    Repo(RepoError),
}

impl Display for TransferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv { line, message } => write!(f, "malformed csv at line {line}: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Csv { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<CsvError> for TransferError {
    fn from(value: CsvError) -> Self {
        Self::Csv {
            line: value.line,
            message: value.message,
        }
    }
}

impl From<RepoError> for TransferError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Why one import row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ImportFailure {
    /// Unparsable, invalid, missing or duplicate fields.
    Fields(Vec<FieldError>),
    /// Row shape does not match the header.
    Malformed(String),
    /// Storage rejected the row.
    Storage(String),
}

impl Display for ImportFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fields(errors) => {
                for (index, error) in errors.iter().enumerate() {
                    if index > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{error}")?;
                }
                Ok(())
            }
            Self::Malformed(message) | Self::Storage(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub reason: ImportFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedRow {
    pub row: usize,
    pub id: RecordId,
}

/// Summary of one import: every data row is either created or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub total_rows: usize,
    pub created: Vec<ImportedRow>,
    pub failures: Vec<ImportRowError>,
}

impl ImportResult {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn created_ids(&self) -> Vec<RecordId> {
        self.created.iter().map(|row| row.id).collect()
    }
}

/// Exported records as text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        csv::write_record(&mut out, &self.headers);
        for row in &self.rows {
            csv::write_record(&mut out, row);
        }
        out
    }

    /// Rows keyed by header, the shape `import_rows` accepts.
    pub fn rows_as_maps(&self) -> Vec<BTreeMap<String, String>> {
        self.rows
            .iter()
            .map(|row| self.headers.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// Import/export driver bound to one repository.
pub struct RecordTransfer<'r, R: RecordRepository + ?Sized> {
    repo: &'r R,
}

impl<'r, R: RecordRepository + ?Sized> RecordTransfer<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    /// Imports field-map rows; columns outside the export set are ignored.
    pub fn import_rows(&self, tenant: TenantId, rows: &[BTreeMap<String, String>]) -> ImportResult {
        let started_at = Instant::now();
        let mut result = ImportResult {
            total_rows: rows.len(),
            ..ImportResult::default()
        };

        for (index, row) in rows.iter().enumerate() {
            let cells = row.iter().map(|(column, raw)| (column.as_str(), raw.as_str()));
            self.import_one(tenant, index + 1, cells, &mut result);
        }

        self.log_import(&result, started_at);
        result
    }

    /// Parses `text` as CSV with a header row and imports its data rows.
    ///
    /// # Errors
    /// Returns `TransferError::Csv` when the document itself is malformed.
    pub fn import_csv(&self, tenant: TenantId, text: &str) -> Result<ImportResult, TransferError> {
        let started_at = Instant::now();
        let document = csv::parse(text)?;
        let mut result = ImportResult {
            total_rows: document.rows.len(),
            ..ImportResult::default()
        };

        for (index, row) in document.rows.iter().enumerate() {
            let row_number = index + 1;
            if row.cells.len() != document.headers.len() {
                result.failures.push(ImportRowError {
                    row: row_number,
                    reason: ImportFailure::Malformed(format!(
                        "line {}: expected {} cells, found {}",
                        row.line,
                        document.headers.len(),
                        row.cells.len()
                    )),
                });
                continue;
            }
            let cells = document
                .headers
                .iter()
                .map(String::as_str)
                .zip(row.cells.iter().map(String::as_str));
            self.import_one(tenant, row_number, cells, &mut result);
        }

        self.log_import(&result, started_at);
        Ok(result)
    }

    /// Exports every matching record with cells in canonical column order.
    ///
    /// # Errors
    /// Propagates repository failures such as `InvalidFilter`.
    pub fn export(&self, tenant: TenantId, filter: &ListFilter) -> Result<ExportTable, TransferError> {
        let started_at = Instant::now();
        let schema = self.repo.schema();
        let delimiter = self.repo.config().tag_delimiter;
        let records = self.repo.collect_all(tenant, filter)?;

        let defs: Vec<_> = schema.export_defs().collect();
        let headers = defs.iter().map(|def| def.name.to_string()).collect();
        let rows = records
            .iter()
            .map(|record| {
                defs.iter()
                    .map(|def| {
                        record
                            .get(def.name)
                            .map(|value| format_cell(value, delimiter))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        info!(
            "event=record_export module=transfer status=ok entity={} rows={} duration_ms={}",
            schema.entity,
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ExportTable { headers, rows })
    }

    pub fn export_csv(&self, tenant: TenantId, filter: &ListFilter) -> Result<String, TransferError> {
        Ok(self.export(tenant, filter)?.to_csv())
    }

    fn import_one<'a>(
        &self,
        tenant: TenantId,
        row: usize,
        cells: impl Iterator<Item = (&'a str, &'a str)>,
        result: &mut ImportResult,
    ) {
        let fields = match self.convert_row(cells) {
            Ok(fields) => fields,
            Err(errors) => {
                result.failures.push(ImportRowError {
                    row,
                    reason: ImportFailure::Fields(errors),
                });
                return;
            }
        };

        match self.repo.create(tenant, fields) {
            Ok(record) => result.created.push(ImportedRow { row, id: record.id }),
            Err(RepoError::Validation(err)) => result.failures.push(ImportRowError {
                row,
                reason: ImportFailure::Fields(err.errors),
            }),
            Err(err) => result.failures.push(ImportRowError {
                row,
                reason: ImportFailure::Storage(err.to_string()),
            }),
        }
    }

    /// Parses exportable cells; on failure also reports what `create` would
    /// reject so one pass names every offending field.
    fn convert_row<'a>(
        &self,
        cells: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Result<FieldMap, Vec<FieldError>> {
        let schema = self.repo.schema();
        let delimiter = self.repo.config().tag_delimiter;
        let mut fields = FieldMap::new();
        let mut errors = Vec::new();

        for (column, raw) in cells {
            let column = column.trim();
            if !schema.export_fields.iter().any(|name| *name == column) {
                continue;
            }
            let Some(def) = schema.field(column) else {
                continue;
            };
            match parse_cell(def.kind, raw, delimiter) {
                Ok(value) if value.is_null() => {}
                Ok(value) => {
                    fields.insert(def.name.to_string(), value);
                }
                Err(kind) => errors.push(FieldError::new(def.name, kind)),
            }
        }

        if errors.is_empty() {
            return Ok(fields);
        }

        if let Err(validation) = validate_create(schema, fields, delimiter) {
            for error in validation.errors {
                if !errors.iter().any(|existing| existing.field == error.field) {
                    errors.push(error);
                }
            }
        }
        Err(errors)
    }

    fn log_import(&self, result: &ImportResult, started_at: Instant) {
        let message = format!(
            "event=record_import module=transfer status={} entity={} rows={} created={} failed={} duration_ms={}",
            if result.failures.is_empty() { "ok" } else { "partial" },
            self.repo.schema().entity,
            result.total_rows,
            result.created_count(),
            result.failed_count(),
            started_at.elapsed().as_millis()
        );
        if result.failures.is_empty() {
            info!("{message}");
        } else {
            warn!("{message}");
        }
    }
}
