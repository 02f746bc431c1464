//! Backend-neutral read queries: a collection, predicates, and an optional sort.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::domain::collections::{Collection, Column, ColumnKind};
use crate::domain::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    /// Column rendered as text equals the value.
    Eq(String),
    /// Column rendered as text differs from the value; missing values count as different.
    NotEq(String),
    /// Array column contains every listed value.
    Contains(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: Column,
    pub op: FilterOp,
}

impl Filter {
    /// Evaluate the predicate against a JSON row.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let cell = row.get(self.column.name).filter(|value| !value.is_null());
        match &self.op {
            FilterOp::Eq(expected) => cell.is_some_and(|value| cell_text(value) == *expected),
            FilterOp::NotEq(excluded) => !cell.is_some_and(|value| cell_text(value) == *excluded),
            FilterOp::Contains(required) => {
                let Some(Value::Array(values)) = cell else {
                    return false;
                };
                required.iter().all(|needle| {
                    values
                        .iter()
                        .any(|value| value.as_str() == Some(needle.as_str()))
                })
            }
        }
    }
}

/// Text rendering of a JSON cell, matching Postgres `::text` for scalar columns.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Canonical text form of a comparison value, rejecting values the column type cannot hold.
fn scalar_value(column: Column, value: String) -> Result<String, DomainError> {
    let invalid = |expected: &'static str| DomainError::InvalidValue {
        column: column.name,
        value: value.clone(),
        expected,
    };
    match column.kind {
        ColumnKind::Uuid => Uuid::parse_str(value.trim())
            .map(|id| id.to_string())
            .map_err(|_| invalid("uuid")),
        ColumnKind::Integer => value
            .trim()
            .parse::<i64>()
            .map(|number| number.to_string())
            .map_err(|_| invalid("integer")),
        ColumnKind::Timestamp => OffsetDateTime::parse(value.trim(), &Rfc3339)
            .map(|_| value.trim().to_string())
            .map_err(|_| invalid("RFC 3339 timestamp")),
        _ => Ok(value),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: Column,
    pub descending: bool,
}

/// Filtered read over one collection. The same value drives both the page
/// read and the count read, so both always see identical predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
}

impl RecordQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            sort: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Result<Self, DomainError> {
        let column = self.scalar_column(column)?;
        let value = scalar_value(column, value.to_string())?;
        self.filters.push(Filter {
            column,
            op: FilterOp::Eq(value),
        });
        Ok(self)
    }

    pub fn not_eq(mut self, column: &str, value: impl ToString) -> Result<Self, DomainError> {
        let column = self.scalar_column(column)?;
        let value = scalar_value(column, value.to_string())?;
        self.filters.push(Filter {
            column,
            op: FilterOp::NotEq(value),
        });
        Ok(self)
    }

    pub fn contains<I, S>(mut self, column: &str, values: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let column = self.collection.column(column)?;
        if column.kind != ColumnKind::TextArray {
            return Err(DomainError::UnsupportedOperation {
                column: column.name,
                reason: "is not an array column",
            });
        }
        self.filters.push(Filter {
            column,
            op: FilterOp::Contains(values.into_iter().map(Into::into).collect()),
        });
        Ok(self)
    }

    /// Put an exclusion predicate ahead of every filter added so far.
    pub fn excluding(mut self, column: &str, value: impl ToString) -> Result<Self, DomainError> {
        let column = self.scalar_column(column)?;
        let value = scalar_value(column, value.to_string())?;
        self.filters.insert(
            0,
            Filter {
                column,
                op: FilterOp::NotEq(value),
            },
        );
        Ok(self)
    }

    pub fn sort_by(mut self, column: &str, descending: bool) -> Result<Self, DomainError> {
        let column = self.scalar_column(column)?;
        self.sort = Some(Sort { column, descending });
        Ok(self)
    }

    /// True when every predicate holds for `row`.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(object) = row.as_object() else {
            return false;
        };
        self.filters.iter().all(|filter| filter.matches(object))
    }

    fn scalar_column(&self, name: &str) -> Result<Column, DomainError> {
        let column = self.collection.column(name)?;
        match column.kind {
            ColumnKind::Json | ColumnKind::TextArray => Err(DomainError::UnsupportedOperation {
                column: column.name,
                reason: "does not support scalar comparison",
            }),
            _ => Ok(column),
        }
    }
}
