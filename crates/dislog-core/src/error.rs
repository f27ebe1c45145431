//! Error types for dislog-core

use thiserror::Error;

/// Errors from the entry codec
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload could not be serialized. This is an input defect and is
    /// never retried.
    #[error("Failed to encode entry data: {0}")]
    Encode(#[source] serde_json::Error),

    /// A line could not be parsed as a record
    #[error("Failed to decode record: {0}")]
    Decode(#[source] serde_json::Error),

    /// A record carried a type tag that is not a recognized entry kind
    #[error("Unknown entry kind: {0}")]
    UnknownKind(String),
}

impl CodecError {
    /// Create a new UnknownKind error
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind(kind.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unknown_kind_error() {
        let err = CodecError::unknown_kind("reaction");
        assert!(matches!(err, CodecError::UnknownKind(_)));
        assert!(err.to_string().contains("reaction"));
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CodecError::Decode(cause);
        assert!(err.source().is_some());
    }
}
