//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The record a command targets does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// A malformed command, rejected before any write.
    #[error("validation error: {0}")]
    Validation(String),

    /// An event could not be serialized into an outbox payload.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Builds a `NotFound` error for the given record kind and identifier.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Opaque failure reported by a publisher. The relay does not distinguish
/// an unreachable bus from a rejected batch.
#[derive(Debug, Clone, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

impl PublishError {
    /// Wraps any displayable error.
    pub fn new(reason: impl ToString) -> Self {
        Self(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_entity_and_id() {
        let err = DomainError::not_found("payment", 42);
        assert_eq!(err.to_string(), "payment not found: 42");
    }

    #[test]
    fn test_serde_error_converts_to_encoding() {
        let serde_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: DomainError = serde_err.into();
        assert!(matches!(err, DomainError::Encoding(_)));
    }
}
