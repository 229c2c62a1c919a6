//! Error types for basis factorization.

use thiserror::Error;

/// Errors reported by [`crate::BasisFactor`].
///
/// Rank deficiency is not an error: [`crate::BasisFactor::build`] returns
/// it as a count. Numerically unacceptable updates are reported through
/// [`crate::UpdateHint::RejectPivot`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactorError {
    /// The constraint matrix is not stored column-major.
    #[error("Constraint matrix must be in CSC storage")]
    NotColumnMajor,

    /// Dimension mismatch
    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked
        what: &'static str,
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A basic variable index does not name a column or a logical.
    #[error("Basic variable {var} out of range (num_col + num_row = {limit})")]
    InvalidBasicVariable {
        /// Offending variable
        var: usize,
        /// num_col + num_row
        limit: usize,
    },

    /// The bound matrix no longer matches the factor dimensions.
    #[error("Constraint matrix binding is invalid: rebind with setup_matrix")]
    InvalidMatrix,

    /// Settings validation failed
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Solve or update requested before a successful build.
    #[error("No valid factorization: call build first")]
    NotBuilt,

    /// Build time limit exceeded
    #[error("Build time limit of {limit_ms} ms exceeded")]
    TimeLimit {
        /// Configured limit
        limit_ms: u64,
    },

    /// Pivotal row out of range
    #[error("Row {row} out of range (num_row = {num_row})")]
    RowOutOfRange {
        /// Offending row
        row: usize,
        /// Number of rows
        num_row: usize,
    },

    /// Attempt to delete a column that is currently basic.
    #[error("Column {col} is basic and cannot be deleted")]
    BasicColumnDeleted {
        /// Offending column
        col: usize,
    },

    /// Column indices passed for deletion are unsorted, repeated or out of range.
    #[error("Invalid column set for deletion: {0}")]
    InvalidColumnSet(String),

    /// Rows can only be appended to a factor without pending updates.
    #[error("{count} updates pending: rebuild before adding rows")]
    UpdatesPending {
        /// Number of updates since the last build
        count: usize,
    },
}

/// Result type for factorization operations.
pub type FactorResult<T> = Result<T, FactorError>;
