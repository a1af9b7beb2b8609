//! Error types for the dataset subsystem.

use thiserror::Error;

/// Message shown when a submitted pair has an empty side.
pub const EMPTY_PAIR_MESSAGE: &str = "User and Assistant messages cannot be empty";

/// Dataset subsystem error type.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A submitted form failed validation; nothing was stored.
    #[error("{0}")]
    Validation(String),
    /// A conversation id outside the current bounds.
    #[error("invalid conversation id {index} (store holds {len})")]
    IndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Store length at the time of the request.
        len: usize,
    },
    /// Export requested while the store holds nothing.
    #[error("no conversations to export")]
    EmptyStore,
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A line of the backing document that is not a valid conversation.
    #[error("line {line}: {source}")]
    CorruptLine {
        /// 1-based line number in the document.
        line: usize,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatasetError {
    /// Validation error for a pair with an empty user or assistant side.
    #[must_use]
    pub fn empty_pair() -> Self {
        Self::Validation(EMPTY_PAIR_MESSAGE.to_string())
    }

    /// Whether the error comes from reading or writing the backing document.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Serialization(_) | Self::CorruptLine { .. }
        )
    }
}

/// Convenience result alias for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pair_message() {
        let err = DatasetError::empty_pair();
        assert_eq!(err.to_string(), EMPTY_PAIR_MESSAGE);
        assert!(!err.is_persistence());
    }

    #[test]
    fn test_io_is_persistence() {
        let err = DatasetError::from(std::io::Error::other("disk full"));
        assert!(err.is_persistence());
        assert!(err.to_string().contains("disk full"));
    }
}
