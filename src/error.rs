//! Typed errors surfaced by the DJ managers.
//!
//! Transient model/catalog failures and malformed model output never reach
//! the caller as errors; they degrade to "nothing queued". Only deployment
//! defects (a missing prompt template, an unreadable settings file) and
//! persistence failures are returned as [`DjError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DjError {
    /// A prompt template required by an operation is not configured.
    #[error("Prompt template '{0}' is not configured")]
    MissingTemplate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("History store error: {0}")]
    History(String),
}

impl From<rusqlite::Error> for DjError {
    fn from(e: rusqlite::Error) -> Self {
        DjError::History(e.to_string())
    }
}

impl From<serde_json::Error> for DjError {
    fn from(e: serde_json::Error) -> Self {
        DjError::Config(format!("Invalid settings JSON: {e}"))
    }
}

pub type DjResult<T> = std::result::Result<T, DjError>;
