//! Error types for descriptor construction and item conversion

use crate::element::ElementType;
use thiserror::Error;

/// Errors raised while building descriptors, items or specifications
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Shape is empty or contains a zero dimension
    #[error("Invalid shape {shape:?}: every dimension must be positive")]
    InvalidShape { shape: Vec<usize> },

    /// Shape product overflows the addressable size
    #[error("Shape {shape:?} with element width {width} overflows usize")]
    SizeOverflow { shape: Vec<usize>, width: usize },

    /// Raw byte length disagrees with shape x width
    #[error("Data length {actual} does not match expected {expected} bytes")]
    LengthMismatch { expected: usize, actual: usize },

    /// Typed access with the wrong scalar type
    #[error("Element type mismatch: item holds {actual:?}, requested {requested:?}")]
    ElementMismatch {
        actual: ElementType,
        requested: ElementType,
    },

    /// Unknown element type tag
    #[error("Unknown element type tag: {tag}")]
    UnknownElementTag { tag: String },

    /// Channel specification violates a structural rule
    #[error("Invalid channel specification: {message}")]
    InvalidSpec { message: String },
}

/// Result type alias for type-level operations
pub type Result<T> = std::result::Result<T, TypeError>;

impl TypeError {
    /// Create an invalid shape error
    pub fn invalid_shape(shape: &[usize]) -> Self {
        Self::InvalidShape {
            shape: shape.to_vec(),
        }
    }

    /// Create an invalid specification error
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }
}
