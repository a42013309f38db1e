use crate::archive::{self, Level};
use crate::constants::ARCHIVE_NAME;
use crate::event::{Reporter, Stage};
use crate::file_util::{SyncStrategy, sync_tree};
use crate::validate::{TreeDiff, compare_trees, validate_trees};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// A source tree, its backup location and how backups are taken.
///
/// The paths are fixed for the lifetime of the job. Calls on one job must be
/// serialized by the caller: both [`BackupJob::back_up`] and
/// [`BackupJob::restore`] delete their target before copying into it.
#[derive(Debug, Clone)]
pub struct BackupJob {
    source: PathBuf,
    destination: PathBuf,
    archive: PathBuf,
    level: Level,
    strategy: SyncStrategy,
    verify: bool,
}

impl BackupJob {
    /// Creates a job writing its archive to `src_archive.tar.gz` in the
    /// working directory.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            archive: PathBuf::from(ARCHIVE_NAME),
            level: Level::default(),
            strategy: SyncStrategy::default(),
            verify: false,
        }
    }

    pub fn with_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.archive = archive.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Compare the trees after every sync and fail if they differ.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// Replaces the destination with a copy of the source, then archives the
    /// destination.
    ///
    /// # Errors
    /// An archive path inside the destination is refused before anything is
    /// touched. Any other failure halts the run. Nothing is rolled back: a
    /// destination that was partially deleted or copied stays that way.
    pub fn back_up<R: Reporter>(&self, reporter: &mut R) -> Result<()> {
        reporter.emit(
            Stage::Start,
            format!("Backing up '{}'", self.source.display()),
        );
        archive::check_outside(&self.destination, &self.archive)?;
        sync_tree(&self.source, &self.destination, self.strategy, reporter)?;
        self.verify_copy(&self.source, &self.destination, reporter)?;

        reporter.emit(
            Stage::Archive,
            format!(
                "Archiving '{}' into '{}'",
                self.destination.display(),
                self.archive.display()
            ),
        );
        archive::archive(&self.destination, &self.archive, self.level)?;
        reporter.emit(Stage::Archive, "Finished archiving");

        reporter.emit(Stage::Complete, "Back up complete");
        Ok(())
    }

    /// Replaces the source with the current contents of the destination.
    pub fn restore<R: Reporter>(&self, reporter: &mut R) -> Result<()> {
        reporter.emit(
            Stage::Start,
            format!("Restoring '{}'", self.source.display()),
        );
        sync_tree(&self.destination, &self.source, self.strategy, reporter)?;
        self.verify_copy(&self.destination, &self.source, reporter)?;
        reporter.emit(Stage::Complete, "Restore complete");
        Ok(())
    }

    /// Whether the destination currently mirrors the source exactly.
    pub fn validate(&self) -> bool {
        validate_trees(&self.source, &self.destination)
    }

    /// Every difference between the source and the destination.
    pub fn compare(&self) -> TreeDiff {
        compare_trees(&self.source, &self.destination)
    }

    fn verify_copy<R: Reporter>(&self, from: &Path, to: &Path, reporter: &mut R) -> Result<()> {
        if !self.verify {
            return Ok(());
        }
        reporter.emit(
            Stage::Verify,
            format!("Comparing '{}' with '{}'", from.display(), to.display()),
        );
        if !validate_trees(from, to) {
            return Err(Error::VerificationFailed {
                left: from.to_path_buf(),
                right: to.to_path_buf(),
            });
        }
        reporter.emit(Stage::Verify, "Trees are identical");
        Ok(())
    }
}
