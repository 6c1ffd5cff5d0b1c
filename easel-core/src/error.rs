//! Error types for editor document operations.

use thiserror::Error;

/// Result type for document operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while editing a document.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Shape not found in the document.
    #[error("Shape not found: {0}")]
    ShapeNotFound(String),

    /// Layer index outside the shape stack.
    #[error("Layer index out of range: {0}")]
    LayerOutOfRange(usize),

    /// A shape with the same ID already exists.
    #[error("Duplicate shape id: {0}")]
    DuplicateShape(String),
}
