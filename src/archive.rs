//! Packs a directory tree into a single `.tar.gz` file.

use crate::file_util::resolve_path;
use crate::{Error, Result};
use clap::ValueEnum;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Supported compression level for the archive.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Level {
    Fastest,
    Faster,
    #[default]
    Default,
    Better,
    Best,
}

impl From<Level> for Compression {
    fn from(level: Level) -> Self {
        match level {
            Level::Fastest => Compression::fast(),
            Level::Faster => Compression::new(3),
            Level::Default => Compression::default(),
            Level::Better => Compression::new(8),
            Level::Best => Compression::best(),
        }
    }
}

/// Writes `dir` into a new gzip-compressed tar file at `archive_path`.
///
/// The archive holds a single top-level entry named after the base name of
/// `dir`. Symbolic links are stored as links. An existing file at
/// `archive_path` is overwritten.
pub fn archive(dir: &Path, archive_path: &Path, level: Level) -> Result<()> {
    let meta = fs::metadata(dir).map_err(|e| Error::io(dir, e))?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    check_outside(dir, archive_path)?;
    let base_name = match dir.file_name() {
        Some(name) => name.to_owned(),
        None => dir
            .canonicalize()
            .map_err(|e| Error::io(dir, e))?
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                Error::config(format!("'{}' has no base name to archive under", dir.display()))
            })?,
    };

    let file = File::create(archive_path).map_err(|e| Error::archive(archive_path, e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), level.into());
    let mut tar_builder = tar::Builder::new(encoder);
    tar_builder.follow_symlinks(false);

    tar_builder
        .append_dir_all(&base_name, dir)
        .map_err(|e| Error::archive(archive_path, e))?;
    tar_builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .and_then(|mut writer| writer.flush())
        .map_err(|e| Error::archive(archive_path, e))?;

    tracing::debug!(
        "Archived '{}' into '{}'",
        dir.display(),
        archive_path.display()
    );
    Ok(())
}

/// Rejects an archive path that lies inside `dir`, with both paths resolved.
pub fn check_outside(dir: &Path, archive_path: &Path) -> Result<()> {
    let resolved_dir = resolve_path(dir)?;
    let resolved_archive = resolve_path(archive_path)?;
    if resolved_archive.starts_with(&resolved_dir) {
        return Err(Error::Overlap {
            src: resolved_archive,
            dest: resolved_dir,
        });
    }
    Ok(())
}

/// Unpacks a `.tar.gz` archive into the directory `into`.
pub fn extract(archive_path: &Path, into: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| Error::io(archive_path, e))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    fs::create_dir_all(into).map_err(|e| Error::io(into, e))?;
    archive
        .unpack(into)
        .map_err(|e| Error::io(archive_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn entry_paths(archive_path: &Path) -> BTreeSet<PathBuf> {
        let file = File::open(archive_path).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect()
    }

    #[test]
    fn test_archive_rooted_at_base_name() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("backup");
        fs::create_dir_all(dir.join("sub"))?;
        fs::write(dir.join("a.txt"), "hello")?;
        fs::write(dir.join("sub/b.txt"), "world")?;

        let archive_path = temp.path().join("out.tar.gz");
        archive(&dir, &archive_path, Level::Default)?;

        let paths = entry_paths(&archive_path);
        assert!(paths.iter().all(|p| p.starts_with("backup")));
        assert!(paths.contains(Path::new("backup/a.txt")));
        assert!(paths.contains(Path::new("backup/sub/b.txt")));
        Ok(())
    }

    #[test]
    fn test_archive_overwrites_existing_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("data");
        fs::create_dir(&dir)?;
        fs::write(dir.join("a.txt"), "hello")?;

        let archive_path = temp.path().join("out.tar.gz");
        fs::write(&archive_path, "garbage that is not gzip")?;
        archive(&dir, &archive_path, Level::Best)?;

        let unpacked = temp.path().join("unpacked");
        extract(&archive_path, &unpacked)?;
        assert_eq!(fs::read_to_string(unpacked.join("data/a.txt"))?, "hello");
        Ok(())
    }

    #[test]
    fn test_archive_missing_dir() {
        let temp = TempDir::new().unwrap();
        let res = archive(
            &temp.path().join("missing"),
            &temp.path().join("out.tar.gz"),
            Level::Default,
        );
        assert!(matches!(res, Err(Error::PathNotFound { .. })));
    }

    #[test]
    fn test_archive_unwritable_target() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        fs::create_dir(&dir).unwrap();
        let res = archive(
            &dir,
            &temp.path().join("no/such/parent/out.tar.gz"),
            Level::Default,
        );
        assert!(matches!(res, Err(Error::ArchiveWrite { .. })));
    }

    #[test]
    fn test_archive_inside_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a.txt"), "hello").unwrap();

        let inside = temp.path().join("other/../data/out.tar.gz");
        let res = archive(&dir, &inside, Level::Default);
        assert!(matches!(res, Err(Error::Overlap { .. })));
        assert!(!dir.join("out.tar.gz").exists());
        assert!(check_outside(&dir, &temp.path().join("out.tar.gz")).is_ok());
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(Compression::from(Level::Fastest).level(), 1);
        assert_eq!(Compression::from(Level::Default).level(), 6);
        assert_eq!(Compression::from(Level::Best).level(), 9);
    }
}
