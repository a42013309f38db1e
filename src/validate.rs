//! Recursive comparison of two directory trees.
//!
//! Two trees are equal when every directory level holds the same entry names
//! with the same kinds, every common regular file has identical bytes, and
//! every common symbolic link points at the same target. Symbolic links are
//! never followed, so a link pointing upwards cannot make the walk loop.
//!
//! Read failures never escape: a file or directory that cannot be compared
//! counts as a difference.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Dir,
    File,
    Symlink,
    Other,
}

/// Entry names of one directory level on both sides, sorted by kind of match.
#[derive(Debug, Default)]
struct LevelDiff {
    left_only: Vec<OsString>,
    right_only: Vec<OsString>,
    /// Present on both sides but not comparable: the kinds differ, or the
    /// entry is neither a file, a directory nor a link.
    funny: Vec<OsString>,
    files: Vec<OsString>,
    links: Vec<OsString>,
    dirs: Vec<OsString>,
}

impl LevelDiff {
    fn has_unmatched(&self) -> bool {
        !self.left_only.is_empty() || !self.right_only.is_empty() || !self.funny.is_empty()
    }
}

/// Returns `true` when `left` and `right` are structurally and byte-for-byte equal.
///
/// Stops at the first difference. Never fails: any entry that cannot be read
/// makes the result `false`.
pub fn validate_trees(left: &Path, right: &Path) -> bool {
    match validate_dir(left, right) {
        Ok(equal) => equal,
        Err(e) => {
            tracing::debug!("{e}");
            false
        }
    }
}

fn validate_dir(left: &Path, right: &Path) -> Result<bool> {
    let level = diff_level(left, right)?;
    if level.has_unmatched() {
        tracing::debug!(
            "'{}' and '{}' hold different entries",
            left.display(),
            right.display()
        );
        return Ok(false);
    }
    for name in &level.files {
        if !same_contents(&left.join(name), &right.join(name))? {
            tracing::debug!("'{}' differs", left.join(name).display());
            return Ok(false);
        }
    }
    for name in &level.links {
        if !same_link(&left.join(name), &right.join(name))? {
            tracing::debug!("'{}' points elsewhere", left.join(name).display());
            return Ok(false);
        }
    }
    for name in &level.dirs {
        if !validate_dir(&left.join(name), &right.join(name))? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Full mismatch report between two trees. Paths are relative to the roots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    pub left_only: Vec<PathBuf>,
    pub right_only: Vec<PathBuf>,
    pub funny: Vec<PathBuf>,
    pub mismatched: Vec<PathBuf>,
    pub errors: Vec<PathBuf>,
}

impl TreeDiff {
    pub fn is_identical(&self) -> bool {
        self.left_only.is_empty()
            && self.right_only.is_empty()
            && self.funny.is_empty()
            && self.mismatched.is_empty()
            && self.errors.is_empty()
    }
}

impl fmt::Display for TreeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identical() {
            return f.write_str("identical");
        }
        let sections = [
            ("only in left", &self.left_only),
            ("only in right", &self.right_only),
            ("type conflict", &self.funny),
            ("content differs", &self.mismatched),
            ("could not compare", &self.errors),
        ];
        let mut first = true;
        for (label, paths) in sections {
            for path in paths {
                if !first {
                    writeln!(f)?;
                }
                first = false;
                let shown = if path.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    path.as_path()
                };
                write!(f, "{label}: {}", shown.display())?;
            }
        }
        Ok(())
    }
}

/// Compares the whole of both trees and collects every difference.
///
/// Unlike [`validate_trees`], this does not stop at the first difference.
pub fn compare_trees(left: &Path, right: &Path) -> TreeDiff {
    let mut diff = TreeDiff::default();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel) = pending.pop() {
        let (l, r) = (left.join(&rel), right.join(&rel));
        let level = match diff_level(&l, &r) {
            Ok(level) => level,
            Err(e) => {
                tracing::debug!("{e}");
                diff.errors.push(rel);
                continue;
            }
        };
        diff.left_only
            .extend(level.left_only.iter().map(|n| rel.join(n)));
        diff.right_only
            .extend(level.right_only.iter().map(|n| rel.join(n)));
        diff.funny.extend(level.funny.iter().map(|n| rel.join(n)));

        for name in &level.files {
            match same_contents(&l.join(name), &r.join(name)) {
                Ok(true) => {}
                Ok(false) => diff.mismatched.push(rel.join(name)),
                Err(e) => {
                    tracing::debug!("{e}");
                    diff.errors.push(rel.join(name));
                }
            }
        }
        for name in &level.links {
            match same_link(&l.join(name), &r.join(name)) {
                Ok(true) => {}
                Ok(false) => diff.mismatched.push(rel.join(name)),
                Err(e) => {
                    tracing::debug!("{e}");
                    diff.errors.push(rel.join(name));
                }
            }
        }
        pending.extend(level.dirs.iter().rev().map(|n| rel.join(n)));
    }
    diff
}

fn list_dir(dir: &Path) -> Result<BTreeMap<OsString, Kind>> {
    let to_err = |e: io::Error| Error::Comparison {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut entries = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(to_err)? {
        let entry = entry.map_err(to_err)?;
        let file_type = entry.file_type().map_err(to_err)?;
        let kind = if file_type.is_symlink() {
            Kind::Symlink
        } else if file_type.is_dir() {
            Kind::Dir
        } else if file_type.is_file() {
            Kind::File
        } else {
            Kind::Other
        };
        entries.insert(entry.file_name(), kind);
    }
    Ok(entries)
}

fn diff_level(left: &Path, right: &Path) -> Result<LevelDiff> {
    let left_entries = list_dir(left)?;
    let mut right_entries = list_dir(right)?;
    let mut level = LevelDiff::default();

    for (name, kind) in left_entries {
        match right_entries.remove(&name) {
            None => level.left_only.push(name),
            Some(other) if other != kind => level.funny.push(name),
            Some(_) => match kind {
                Kind::File => level.files.push(name),
                Kind::Symlink => level.links.push(name),
                Kind::Dir => level.dirs.push(name),
                Kind::Other => level.funny.push(name),
            },
        }
    }
    level.right_only.extend(right_entries.into_keys());
    Ok(level)
}

/// Byte-for-byte comparison of two regular files.
fn same_contents(left: &Path, right: &Path) -> Result<bool> {
    let open = |path: &Path| {
        File::open(path).map_err(|e| Error::Comparison {
            path: path.to_path_buf(),
            source: e,
        })
    };
    let (lf, rf) = (open(left)?, open(right)?);
    let size = |file: &File, path: &Path| {
        file.metadata()
            .map(|m| m.len())
            .map_err(|e| Error::Comparison {
                path: path.to_path_buf(),
                source: e,
            })
    };
    if size(&lf, left)? != size(&rf, right)? {
        return Ok(false);
    }

    let mut lr = BufReader::new(lf);
    let mut rr = BufReader::new(rf);
    let mut lbuf = vec![0u8; CHUNK_SIZE];
    let mut rbuf = vec![0u8; CHUNK_SIZE];
    loop {
        let ln = fill(&mut lr, &mut lbuf).map_err(|e| Error::Comparison {
            path: left.to_path_buf(),
            source: e,
        })?;
        let rn = fill(&mut rr, &mut rbuf).map_err(|e| Error::Comparison {
            path: right.to_path_buf(),
            source: e,
        })?;
        if ln != rn || lbuf[..ln] != rbuf[..rn] {
            return Ok(false);
        }
        if ln == 0 {
            return Ok(true);
        }
    }
}

/// Reads until `buf` is full or the reader is exhausted.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn same_link(left: &Path, right: &Path) -> Result<bool> {
    let read = |path: &Path| {
        fs::read_link(path).map_err(|e| Error::Comparison {
            path: path.to_path_buf(),
            source: e,
        })
    };
    Ok(read(left)? == read(right)?)
}
