//! Error types for the wallet intent parser.
//!
//! Parse outcomes are data (see [`crate::types::ParseResult`]); this type only
//! carries resource failures that a caller has to handle.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Resolver failure: {0}")]
    Resolver(String),

    #[error("Preference store error: {0}")]
    PreferenceStore(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
