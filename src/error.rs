//! Error taxonomy for the acquisition layer.
//!
//! Returned by the record parsers and system counter readers; the platform
//! layer turns them into a sentinel, an empty collection or a dropped record.

use std::path::PathBuf;

/// Internal failure while reading or parsing a raw source.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Source vanished or could not be opened (process exited, permission race).
    #[error("source unavailable: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source exists but its content does not have the expected shape.
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
}

impl TelemetryError {
    /// A source path that is not present at all.
    pub fn missing(path: &str) -> Self {
        Self::Io {
            path: PathBuf::from(path),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
    }

    pub fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
