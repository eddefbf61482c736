//! Error types for deformation engine operations.
//!
//! Every failure in this workspace is a contract violation detected before
//! any output buffer is touched. There is no retryable error class.

use thiserror::Error;

use crate::image::DataType;

/// Main error type for image and deformation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FfdError {
    /// Two images that must share an element type do not.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    /// A non floating-point image reached a field or grid evaluator.
    #[error("Unsupported data type: {0} (only f32 and f64 are supported)")]
    UnsupportedDataType(DataType),

    /// Vector component count other than 2 or 3.
    #[error("Unsupported dimensionality: {0} components (expected 2 or 3)")]
    UnsupportedDimensionality(usize),

    /// Mutually exclusive options were requested together.
    #[error("Invalid combination: {0}")]
    InvalidCombination(String),

    /// Buffer or lattice shape does not match what the operation expects.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Geometry metadata is inconsistent or missing.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// An affine matrix could not be inverted.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),
}

/// Result type for deformation engine operations.
pub type Result<T> = std::result::Result<T, FfdError>;

impl FfdError {
    /// Create a type mismatch error.
    pub fn type_mismatch(expected: DataType, actual: DataType) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Create an invalid combination error.
    pub fn invalid_combination(msg: impl Into<String>) -> Self {
        Self::InvalidCombination(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: impl Into<Vec<usize>>, actual: impl Into<Vec<usize>>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid geometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create a singular matrix error.
    pub fn singular_matrix(msg: impl Into<String>) -> Self {
        Self::SingularMatrix(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FfdError::type_mismatch(DataType::Float32, DataType::Float64);
        assert_eq!(err.to_string(), "Type mismatch: expected f32, got f64");
    }

    #[test]
    fn test_unsupported_data_type_display() {
        let err = FfdError::UnsupportedDataType(DataType::Int16);
        assert!(err.to_string().contains("i16"));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = FfdError::shape_mismatch(vec![10, 10], vec![5, 5]);
        let err_str = err.to_string();
        assert!(err_str.contains("expected"));
        assert!(err_str.contains("got"));
        assert!(matches!(err, FfdError::ShapeMismatch { .. }));
    }
}
