use std::path::PathBuf;

use thiserror::Error;

/// imgstream error types
#[derive(Error, Debug)]
pub enum ImageError {
    /// No handler is registered for the format identifier
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Container archive does not hold exactly one image entry
    #[error("Invalid archive image: {archive} contains {found} image entries, expected exactly 1")]
    InvalidArchiveImage { archive: PathBuf, found: usize },

    /// Sidecar manifest is present but unparseable
    #[error("Invalid archive manifest.json: {archive} - {message}")]
    InvalidManifest { archive: PathBuf, message: String },

    /// Entry was requested but is not listed in the archive
    #[error("Entry not found: {entry} in {archive}")]
    EntryNotFound { archive: PathBuf, entry: String },

    /// I/O failure while reading a specific archive entry
    #[error("Failed to read entry {entry} in {archive}: {source}")]
    EntryIo {
        archive: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be opened or its index is unreadable
    #[error("Archive error: {archive} - {message}")]
    ArchiveError { archive: PathBuf, message: String },

    /// Sidecar entry exceeds the configured buffering limit
    #[error("Sidecar {entry} exceeds {limit} bytes")]
    SidecarTooLarge { entry: String, limit: u64 },

    /// xz stream footer or index is malformed
    #[error("Invalid xz index: {path} - {message}")]
    XzIndexError { path: PathBuf, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ImageError {
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, ImageError::UnsupportedFormat(_))
    }

    pub fn is_invalid_archive_image(&self) -> bool {
        matches!(self, ImageError::InvalidArchiveImage { .. })
    }

    pub fn is_invalid_manifest(&self) -> bool {
        matches!(self, ImageError::InvalidManifest { .. })
    }

    pub fn is_entry_not_found(&self) -> bool {
        matches!(self, ImageError::EntryNotFound { .. })
    }
}

impl From<serde_json::Error> for ImageError {
    fn from(err: serde_json::Error) -> Self {
        ImageError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImageError {
    fn from(err: serde_yaml::Error) -> Self {
        ImageError::SerializationError(err.to_string())
    }
}

/// Result type alias for imgstream operations
pub type Result<T> = std::result::Result<T, ImageError>;
