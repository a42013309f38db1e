//! Tree synchronization: replaces a destination directory with a full copy
//! of a source directory.

use crate::event::{Reporter, Stage};
use crate::inspect::{DirectoryState, inspect};
use crate::{Error, Result};
use clap::ValueEnum;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// How an existing destination is replaced.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Remove the destination, then copy. An interruption in between leaves
    /// the destination partially populated.
    #[default]
    Replace,
    /// Copy into a sibling staging directory first and rename it into place,
    /// so the destination is never observed half-deleted.
    Staged,
}

/// Replaces `dest` with a copy of `source` using the given strategy.
///
/// # Errors
/// Fails if `source` is missing or not a directory, if the two paths overlap,
/// if the old `dest` cannot be fully removed, or on any copy failure.
pub fn sync_tree<R: Reporter>(
    source: &Path,
    dest: &Path,
    strategy: SyncStrategy,
    reporter: &mut R,
) -> Result<()> {
    check_source(source)?;
    check_overlap(source, dest)?;
    if let Ok(meta) = fs::symlink_metadata(dest)
        && !meta.is_dir()
    {
        return Err(Error::NotADirectory {
            path: dest.to_path_buf(),
        });
    }

    let state = inspect(dest)?;
    let msg = match state {
        DirectoryState::NotFound => format!("'{}' does not exist", dest.display()),
        DirectoryState::Empty => format!("'{}' is empty", dest.display()),
        DirectoryState::NonEmpty => format!("'{}' is not empty", dest.display()),
    };
    reporter.emit(Stage::Inspect, msg);

    match strategy {
        SyncStrategy::Replace => replace(source, dest, state, reporter),
        SyncStrategy::Staged => replace_staged(source, dest, state, reporter),
    }
}

fn replace<R: Reporter>(
    source: &Path,
    dest: &Path,
    state: DirectoryState,
    reporter: &mut R,
) -> Result<()> {
    if state != DirectoryState::NotFound {
        reporter.emit(Stage::Delete, format!("Deleting '{}'", dest.display()));
        remove_tree(dest)?;
        reporter.emit(Stage::Delete, format!("Deleted '{}'", dest.display()));
    }
    reporter.emit(
        Stage::Copy,
        format!("Copying '{}' to '{}'", source.display(), dest.display()),
    );
    copy_tree(source, dest)?;
    reporter.emit(Stage::Copy, "Finished copying");
    Ok(())
}

fn replace_staged<R: Reporter>(
    source: &Path,
    dest: &Path,
    state: DirectoryState,
    reporter: &mut R,
) -> Result<()> {
    let staging = sibling(dest, "staging")?;
    if fs::symlink_metadata(&staging).is_ok() {
        remove_tree(&staging)?;
    }
    reporter.emit(
        Stage::Copy,
        format!(
            "Copying '{}' to staging '{}'",
            source.display(),
            staging.display()
        ),
    );
    if let Err(e) = copy_tree(source, &staging) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            tracing::warn!("Failed to clean up '{}': {cleanup}", staging.display());
        }
        return Err(e);
    }

    if state == DirectoryState::NotFound {
        fs::rename(&staging, dest).map_err(|e| Error::io(dest, e))?;
    } else {
        let old = sibling(dest, "old")?;
        if fs::symlink_metadata(&old).is_ok() {
            remove_tree(&old)?;
        }
        fs::rename(dest, &old).map_err(|e| Error::io(dest, e))?;
        fs::rename(&staging, dest).map_err(|e| Error::io(dest, e))?;
        reporter.emit(Stage::Delete, format!("Deleting '{}'", old.display()));
        // The new tree is already in place; a leftover is only reported.
        match remove_tree(&old) {
            Ok(()) => reporter.emit(Stage::Delete, format!("Deleted '{}'", old.display())),
            Err(e) => {
                tracing::warn!("{e}");
                reporter.emit(Stage::Delete, format!("Left behind '{}'", old.display()));
            }
        }
    }
    reporter.emit(Stage::Copy, "Finished copying");
    Ok(())
}

/// Recursively removes the tree at `path`.
///
/// A missing `path` is reported as [`Error::PathNotFound`]. Any failure once
/// removal has begun is [`Error::PartialDeletion`]: the tree may be missing
/// an arbitrary subset of its entries.
pub fn remove_tree(path: &Path) -> Result<()> {
    fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    fs::remove_dir_all(path).map_err(|source| Error::PartialDeletion {
        path: path.to_path_buf(),
        source,
    })
}

/// Copies the directory `src` to `dest`, creating `dest` and any missing parents.
///
/// Regular files keep their permissions and timestamps; symbolic links are
/// recreated as links; directories get their permissions and timestamps once
/// their contents are in place. Other file types are skipped.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    check_source(src)?;
    let mut dirs: Vec<(PathBuf, Metadata)> = vec![];

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dest.join(rel);
        let meta = entry.metadata().map_err(walk_error)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
            dirs.push((target, meta));
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target, &meta)?;
        } else if file_type.is_file() {
            copy_file(entry.path(), &target, &meta)?;
        } else {
            tracing::warn!("Skipping special file '{}'", entry.path().display());
        }
    }

    // Deepest first, so a read-only directory is locked after its children.
    for (dir, meta) in dirs.iter().rev() {
        fs::set_permissions(dir, meta.permissions()).map_err(|e| Error::io(dir, e))?;
        set_times(dir, meta)?;
    }
    Ok(())
}

fn copy_file(src: &Path, dest: &Path, meta: &Metadata) -> Result<()> {
    fs::copy(src, dest).map_err(|e| Error::io(src, e))?;
    set_times(dest, meta)
}

fn set_times(path: &Path, meta: &Metadata) -> Result<()> {
    let atime = FileTime::from_last_access_time(meta);
    let mtime = FileTime::from_last_modification_time(meta);
    filetime::set_file_times(path, atime, mtime).map_err(|e| Error::io(path, e))
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path, meta: &Metadata) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| Error::io(src, e))?;
    std::os::unix::fs::symlink(&link, dest).map_err(|e| Error::io(dest, e))?;
    let atime = FileTime::from_last_access_time(meta);
    let mtime = FileTime::from_last_modification_time(meta);
    filetime::set_symlink_file_times(dest, atime, mtime).map_err(|e| Error::io(dest, e))
}

#[cfg(windows)]
fn copy_symlink(src: &Path, dest: &Path, _meta: &Metadata) -> Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let link = fs::read_link(src).map_err(|e| Error::io(src, e))?;
    let points_to_dir = fs::metadata(src).map(|m| m.is_dir()).unwrap_or(false);
    let res = if points_to_dir {
        symlink_dir(&link, dest)
    } else {
        symlink_file(&link, dest)
    };
    res.map_err(|e| Error::io(dest, e))
}

fn check_source(source: &Path) -> Result<()> {
    let meta = fs::metadata(source).map_err(|e| Error::io(source, e))?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory {
            path: source.to_path_buf(),
        });
    }
    Ok(())
}

/// Rejects a destination inside the source (the copy would feed itself)
/// and a source inside the destination (the delete would eat it).
fn check_overlap(source: &Path, dest: &Path) -> Result<()> {
    let abs_source = resolve_path(source)?;
    let abs_dest = resolve_path(dest)?;
    if abs_dest.starts_with(&abs_source) || abs_source.starts_with(&abs_dest) {
        return Err(Error::Overlap {
            src: abs_source,
            dest: abs_dest,
        });
    }
    Ok(())
}

/// Returns the absolute form of `path` with symbolic links and `.`/`..`
/// resolved, whether or not `path` exists.
///
/// The deepest existing ancestor is canonicalized; the components below it
/// are appended lexically.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
    let mut tail = vec![];
    let mut existing = abs.as_path();
    let mut resolved = loop {
        match fs::canonicalize(existing) {
            Ok(base) => break base,
            Err(e) => match (existing.parent(), existing.components().next_back()) {
                (Some(parent), Some(last)) => {
                    tail.push(last);
                    existing = parent;
                }
                _ => return Err(Error::io(path, e)),
            },
        }
    };
    for component in tail.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

/// `.<name>.dbackup-<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| Error::NotADirectory {
        path: path.to_path_buf(),
    })?;
    let mut sibling = OsString::from(".");
    sibling.push(name);
    sibling.push(format!(".dbackup-{suffix}"));
    Ok(path.with_file_name(sibling))
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    match err.into_io_error() {
        Some(e) => Error::io(path, e),
        None => Error::Io {
            path,
            source: std::io::Error::other("filesystem loop detected"),
        },
    }
}
