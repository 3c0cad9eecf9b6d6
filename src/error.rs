//! Error types

use thiserror::Error;

/// Errors raised by the address pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Input bytes are not valid UTF-8
    #[error("Input is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// Input contains no word or numeric token
    #[error("Input contains no address tokens")]
    UnparsableInput,

    /// Rule tables are missing or corrupt
    #[error("Failed to load rule tables from {origin}: {reason}")]
    DataLoadError {
        /// Where the tables were read from (a path or `<embedded>`)
        origin: String,
        /// What went wrong
        reason: String,
    },
}

impl Error {
    pub(crate) fn data_load(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataLoadError {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
