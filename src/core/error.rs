//! Error types for the probe pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing a crate.
///
/// Subprocess failures (a build or clone exiting non-zero) are not errors:
/// they are captured as outcomes and recorded in the run report.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("crate '{0}' not found on registry")]
    CrateNotFound(String),

    #[error("HTTP request failed: {url} (status {status})")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP request failed: {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to parse registry response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Version {selector} not found for crate '{krate}'.")]
    VersionNotFound { krate: String, selector: String },

    #[error("Download path not found in version info.")]
    MissingDownloadPath,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("extraction failed: {0}")]
    Extract(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "crates directory is locked by another run. If this is incorrect, delete '{}'",
        .0.display()
    )]
    Locked(PathBuf),

    #[error("{action} {}: {source}", path.display())]
    Fs {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Wrap an I/O error with the filesystem action and path involved.
    pub fn fs(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Fs {
            action,
            path,
            source,
        }
    }
}

/// Result alias used throughout the library.
pub type Result<T, E = ProbeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_found_message() {
        let err = ProbeError::VersionNotFound {
            krate: "ring".to_string(),
            selector: "9.9.9".to_string(),
        };
        assert_eq!(err.to_string(), "Version 9.9.9 not found for crate 'ring'.");
    }

    #[test]
    fn test_fs_error_names_path() {
        let err = ProbeError::fs("cannot create", "/tmp/x")(std::io::Error::other("denied"));
        let msg = err.to_string();
        assert!(msg.contains("cannot create /tmp/x"), "got: {msg}");
        assert!(msg.contains("denied"));
    }
}
