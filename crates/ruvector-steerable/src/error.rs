//! Error types for ruvector-steerable
//!
//! Every variant except the cache ones describes a programming or
//! configuration defect. None of them is retried.

use thiserror::Error;

use crate::cache::CacheError;

/// Result type alias for ruvector-steerable operations
pub type Result<T> = std::result::Result<T, SteerableError>;

/// Errors raised while constructing or verifying steerable kernel bases
#[derive(Error, Debug)]
pub enum SteerableError {
    /// The stacked Sylvester system did not have a one-dimensional null space
    #[error(
        "Null space of the Sylvester system for (J={order_j}, in={order_in}, out={order_out}) \
         has dimension {got}, expected {expected}"
    )]
    NullSpaceDimension {
        /// Intermediate order J
        order_j: usize,
        /// Input representation order
        order_in: usize,
        /// Output representation order
        order_out: usize,
        /// Expected dimension (always 1)
        expected: usize,
        /// Dimension found
        got: usize,
    },

    /// An internal equivariance self-check failed
    #[error("Equivariance violated in {context} (max deviation {max_deviation:.3e})")]
    EquivarianceViolation {
        /// Which check failed
        context: String,
        /// Largest element-wise deviation observed
        max_deviation: f64,
    },

    /// Shape or length precondition mismatch
    #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Where the mismatch was detected
        context: String,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Singular value decomposition did not converge
    #[error("SVD failed to converge for a {rows}x{cols} matrix")]
    SvdFailure {
        /// Number of rows
        rows: usize,
        /// Number of columns
        cols: usize,
    },

    /// A basis element has no energy and cannot be normalized
    #[error("Basis element {index} has zero Frobenius norm")]
    ZeroEnergy {
        /// Index of the offending basis element
        index: usize,
    },

    /// ndarray reshape failure
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl SteerableError {
    /// Create a null-space dimension error
    pub fn null_space_dimension(
        order_j: usize,
        order_in: usize,
        order_out: usize,
        got: usize,
    ) -> Self {
        Self::NullSpaceDimension {
            order_j,
            order_in,
            order_out,
            expected: 1,
            got,
        }
    }

    /// Create an equivariance violation error
    pub fn equivariance_violation(context: impl Into<String>, max_deviation: f64) -> Self {
        Self::EquivarianceViolation {
            context: context.into(),
            max_deviation,
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            got,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an SVD convergence error
    pub fn svd_failure(rows: usize, cols: usize) -> Self {
        Self::SvdFailure { rows, cols }
    }
}
