//! Error taxonomy shared by the synchronizer, the archiver and the validator.

use std::io;
use std::path::{Path, PathBuf};

/// Unified result type for all fallible library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The path '{}' does not exist", path.display())]
    PathNotFound { path: PathBuf },

    #[error("Permission denied at '{}': {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Removal of an existing tree stopped halfway. The tree is left in an
    /// indeterminate state and must not be copied into.
    #[error("Failed to fully remove '{}': {source}", path.display())]
    PartialDeletion {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write archive '{}': {source}", path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to compare '{}': {source}", path.display())]
    Comparison {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("The path '{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("'{}' and '{}' overlap", src.display(), dest.display())]
    Overlap { src: PathBuf, dest: PathBuf },

    #[error("Verification failed: '{}' and '{}' differ", left.display(), right.display())]
    VerificationFailed { left: PathBuf, right: PathBuf },

    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /// Classifies an I/O failure at `path` by its kind.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Self::PathNotFound { path },
            io::ErrorKind::PermissionDenied => Self::Permission { path, source },
            _ => Self::Io { path, source },
        }
    }

    pub fn archive(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::ArchiveWrite {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let err = Error::io("/a", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::PathNotFound { .. }));

        let err = Error::io("/a", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::Permission { .. }));

        let err = Error::io("/a", io::Error::other("disk on fire"));
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_display_contains_path() {
        let err = Error::PathNotFound {
            path: PathBuf::from("/no/such/dir"),
        };
        assert_eq!(err.to_string(), "The path '/no/such/dir' does not exist");
    }
}
