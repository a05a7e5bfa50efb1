//! Bulk operation outcomes.
//!
//! # Invariants
//! - `BulkResult::items` preserves the caller's id order, one entry per
//!   requested id (duplicates included).
//! - A failed item never implies anything about its neighbours.

use crate::model::record::RecordId;
use crate::repo::error::RepoError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkFailureKind {
    NotFound,
    Validation,
    Storage,
}

/// Why one id of a bulk request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub kind: BulkFailureKind,
    pub reason: String,
    /// Offending field names for validation failures.
    pub fields: Vec<String>,
}

impl From<&RepoError> for BulkFailure {
    fn from(err: &RepoError) -> Self {
        match err {
            RepoError::NotFound(_) => Self {
                kind: BulkFailureKind::NotFound,
                reason: err.to_string(),
                fields: Vec::new(),
            },
            RepoError::Validation(validation) => Self {
                kind: BulkFailureKind::Validation,
                reason: err.to_string(),
                fields: validation
                    .errors
                    .iter()
                    .map(|error| error.field.clone())
                    .collect(),
            },
            other => Self {
                kind: BulkFailureKind::Storage,
                reason: other.to_string(),
                fields: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkOutcome {
    Succeeded,
    Failed(BulkFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItem {
    pub id: RecordId,
    pub outcome: BulkOutcome,
}

impl BulkItem {
    pub(crate) fn from_result<T>(id: RecordId, result: &Result<T, RepoError>) -> Self {
        let outcome = match result {
            Ok(_) => BulkOutcome::Succeeded,
            Err(err) => BulkOutcome::Failed(BulkFailure::from(err)),
        };
        Self { id, outcome }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BulkOutcome::Succeeded)
    }

    pub fn failure(&self) -> Option<&BulkFailure> {
        match &self.outcome {
            BulkOutcome::Succeeded => None,
            BulkOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Per-id report of one bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    pub items: Vec<BulkItem>,
}

impl BulkResult {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (RecordId, &BulkFailure)> {
        self.items
            .iter()
            .filter_map(|item| item.failure().map(|failure| (item.id, failure)))
    }
}
