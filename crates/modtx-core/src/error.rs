//! Dataset ingestion error types

use thiserror::Error;

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Errors that can occur while ingesting a dataset
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Unexpected token or shape in a parsed file
    #[error("input format error: {0}")]
    InputFormat(String),

    /// Allocation failure while reading a large slab
    #[error("could not allocate {bytes} bytes")]
    ResourceExhausted { bytes: usize },

    /// Modulation alias table is inconsistent; fatal at startup
    #[error("modulation alias \"{0}\" appears in more than one place")]
    DuplicateAlias(String),

    /// A parse was requested while another is still running
    #[error("a dataset parse is already in progress")]
    ParseInProgress,

    /// Failed to open or read the input file
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatasetError {
    /// Shorthand for an [`DatasetError::InputFormat`] with a formatted message.
    pub fn format(msg: impl Into<String>) -> Self {
        DatasetError::InputFormat(msg.into())
    }
}
