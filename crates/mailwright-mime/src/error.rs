//! Error types for MIME operations.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// HTML could not be converted to plain text.
    #[error("HTML parse error: {0}")]
    HtmlParse(String),
}
