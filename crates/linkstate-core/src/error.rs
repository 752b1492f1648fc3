//! Error types for linkstate
//!
//! Every variant is a caller contract violation surfaced synchronously from
//! the offending call. Validation happens before mutation, so a failed call
//! leaves no partial state behind.

use thiserror::Error;

/// Core linkstate errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Invalid group name: {0:?} (must be a non-empty string)")]
    InvalidGroupName(String),

    #[error("Invalid variable name: {0:?} (must be a non-empty string)")]
    InvalidVarName(String),

    #[error("List is not sorted or contains duplicate (at index {index})")]
    UnsortedList { index: usize },

    #[error("Variable \"filterset\" does not hold a filter set")]
    NotAFilterSet,
}

/// Result type for linkstate operations
pub type LinkResult<T> = Result<T, LinkError>;
