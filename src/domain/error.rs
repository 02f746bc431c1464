//! Errors raised while checking a query against the collection catalogue.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("unknown column `{column}` for collection `{collection}`")]
    UnknownColumn {
        collection: &'static str,
        column: String,
    },
    #[error("column `{column}` {reason}")]
    UnsupportedOperation {
        column: &'static str,
        reason: &'static str,
    },
    #[error("value `{value}` for column `{column}` is not a valid {expected}")]
    InvalidValue {
        column: &'static str,
        value: String,
        expected: &'static str,
    },
}
