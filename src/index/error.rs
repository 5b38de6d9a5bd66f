//! Index engine error types

use thiserror::Error;

/// Smallest order that keeps both halves of a split non-empty
pub const MIN_ORDER: usize = 3;

/// Errors raised by the B+Tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Node capacity too small to split
    #[error("Invalid order {0}: must be at least {MIN_ORDER}")]
    InvalidOrder(usize),

    /// Internal consistency check failed; indicates a bug in the tree
    #[error("Structural invariant violated: {0}")]
    StructuralInvariantViolation(String),
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Report a broken invariant.
///
/// Fatal in debug builds. In release builds the violation is logged and
/// returned so the caller can reject the operation.
pub(crate) fn invariant_violation(message: impl Into<String>) -> IndexError {
    let message = message.into();
    tracing::error!("B+Tree invariant violated: {}", message);
    debug_assert!(false, "B+Tree invariant violated: {message}");
    IndexError::StructuralInvariantViolation(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::InvalidOrder(2);
        assert_eq!(err.to_string(), "Invalid order 2: must be at least 3");

        let err = IndexError::StructuralInvariantViolation("leaf chain broken".into());
        assert!(err.to_string().contains("leaf chain broken"));
    }
}
