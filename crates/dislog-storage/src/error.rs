//! Error types for dislog-storage
//!
//! [`StorageError`] covers the environment failing us (directories, opens,
//! writes). [`AppendError`] is what the append pipeline returns and keeps
//! bad input apart from unavailable storage so callers can choose a policy.

use std::path::PathBuf;

use dislog_core::{CodecError, EntityId};
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The bucket directory could not be created
    #[error("Failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bucket file could not be opened or created
    #[error("Failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a record to an open bucket file failed
    #[error("Failed to write log file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A write was attempted on an entity with no open file
    #[error("No log file open for entity {0}")]
    NotOpen(EntityId),
}

impl StorageError {
    /// The file or directory involved, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            StorageError::CreateDir { path, .. }
            | StorageError::Open { path, .. }
            | StorageError::Write { path, .. } => Some(path),
            StorageError::NotOpen(_) => None,
        }
    }
}

/// Errors returned by [`EventLogger::append`](crate::EventLogger::append)
#[derive(Debug, Error)]
pub enum AppendError {
    /// The payload could not be encoded; nothing was written
    #[error("Encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// Storage was unavailable
    #[error("Storage error: {0}")]
    Io(#[from] StorageError),
}

impl AppendError {
    /// True when the caller supplied bad input, false when storage failed
    pub fn is_input_error(&self) -> bool {
        matches!(self, AppendError::Encoding(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_open_has_no_path() {
        let err = StorageError::NotOpen(EntityId::new(7));
        assert!(err.path().is_none());
        assert_eq!(err.to_string(), "No log file open for entity 7");
    }

    #[test]
    fn test_open_error_names_path() {
        let err = StorageError::Open {
            path: PathBuf::from("/logs/2024-11/42.ndjson"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("2024-11/42.ndjson"));
        assert_eq!(err.path(), Some(std::path::Path::new("/logs/2024-11/42.ndjson")));
    }

    #[test]
    fn test_append_error_classification() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let encoding: AppendError = CodecError::Encode(cause).into();
        assert!(encoding.is_input_error());

        let io: AppendError = StorageError::NotOpen(EntityId::new(1)).into();
        assert!(!io.is_input_error());
        assert!(matches!(io, AppendError::Io(StorageError::NotOpen(_))));
    }
}
