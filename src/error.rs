//! Error types for cachicamo.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The blob store could not persist an upload.
    #[error("save failed: {0}")]
    SaveFailed(String),

    /// The deadline elapsed before the upload worker reported back.
    /// The save may still land afterwards.
    #[error("timed out waiting for save to complete")]
    TimedOut,

    #[error("visitor count is 0")]
    CounterUnderflow,

    #[error("invalid phrase")]
    InvalidPhrase,

    #[error("invalid blob name: {0:?}")]
    InvalidBlobName(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
