//! List filters, pagination and page envelopes.

use crate::schema::value::FieldValue;
use serde::Serialize;

/// Operator of one filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateOp {
    /// Equality; on tag fields, membership of one tag.
    Eq(FieldValue),
    /// Equality with any listed value; on tag fields, overlap.
    OneOf(Vec<FieldValue>),
    /// Inclusive bounds; at least one side must be set.
    Range {
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    },
    /// Case-insensitive substring.
    Contains(String),
}

/// One predicate against a declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: PredicateOp,
}

/// Conjunction of predicates applied inside one tenant scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub predicates: Vec<Predicate>,
    /// Free text matched against every substring-filterable field.
    pub search: Option<String>,
    /// Audit/restore paths only.
    pub include_deleted: bool,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            op: PredicateOp::Eq(value.into()),
        });
        self
    }

    pub fn one_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.predicates.push(Predicate {
            field: field.into(),
            op: PredicateOp::OneOf(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn range(
        mut self,
        field: impl Into<String>,
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    ) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            op: PredicateOp::Range { min, max },
        });
        self
    }

    pub fn contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            op: PredicateOp::Contains(needle.into()),
        });
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Offset/limit request. `limit` is normalized by `RepoConfig`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    pub fn first(limit: u32) -> Self {
        Self::new(limit, 0)
    }
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    /// Effective limit after normalization.
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.items.len() as u64) < self.total_count
    }
}
