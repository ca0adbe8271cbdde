use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RipError {
    #[error("invalid channel id: {0}")]
    InvalidChannelId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("playlist request failed: {0}")]
    PlaylistHttp(String),

    #[error("playlist returned status {status}: {message}")]
    PlaylistStatus { status: u16, message: String },

    #[error("failed to decode playlist: {0}")]
    PlaylistDecode(String),

    #[error("media request failed: {0}")]
    MediaHttp(String),

    #[error("media returned status {status}: {message}")]
    MediaStatus { status: u16, message: String },

    #[error("track not found: {0}")]
    TrackNotFound(String),

    #[error("sqlite store error: {0}")]
    Sqlite(String),

    #[error("redis store error: {0}")]
    Redis(String),

    #[error("failed to encode or decode stored record: {0}")]
    StoreCodec(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to install interrupt handler: {0}")]
    Signal(String),
}

impl RipError {
    /// A store lookup miss. Expected during novelty filtering, never logged as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RipError::TrackNotFound(_))
    }
}
