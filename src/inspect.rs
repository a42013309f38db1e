use crate::{Error, Result};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Classification of a directory path, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    NotFound,
    Empty,
    NonEmpty,
}

impl fmt::Display for DirectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DirectoryState::NotFound => "not found",
            DirectoryState::Empty => "empty",
            DirectoryState::NonEmpty => "non-empty",
        };
        f.write_str(s)
    }
}

/// Lists the immediate entries of `path` and classifies it.
///
/// Only a read-only listing is attempted; errors other than "not found"
/// (permission denied, `path` being a file) are returned.
pub fn inspect(path: &Path) -> Result<DirectoryState> {
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DirectoryState::NotFound),
        Err(e) => return Err(Error::io(path, e)),
    };
    match entries.next() {
        None => Ok(DirectoryState::Empty),
        Some(Ok(_)) => Ok(DirectoryState::NonEmpty),
        Some(Err(e)) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_lifecycle() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("dir");
        assert_eq!(inspect(&dir)?, DirectoryState::NotFound);

        fs::create_dir(&dir)?;
        assert_eq!(inspect(&dir)?, DirectoryState::Empty);

        fs::write(dir.join("a.txt"), b"hello")?;
        assert_eq!(inspect(&dir)?, DirectoryState::NonEmpty);
        Ok(())
    }

    #[test]
    fn test_inspect_subdirectory_counts_as_entry() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        fs::create_dir(temp.path().join("sub"))?;
        assert_eq!(inspect(temp.path())?, DirectoryState::NonEmpty);
        Ok(())
    }

    #[test]
    fn test_inspect_file_is_error() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x")?;
        assert!(inspect(&file).is_err());
        Ok(())
    }

    #[test]
    fn test_display() {
        assert_eq!(DirectoryState::NotFound.to_string(), "not found");
        assert_eq!(DirectoryState::Empty.to_string(), "empty");
        assert_eq!(DirectoryState::NonEmpty.to_string(), "non-empty");
    }
}
