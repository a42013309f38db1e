//! Persistent configuration.
//!
//! The configuration file remembers the source and destination of the backup
//! so `dbk backup` and `dbk restore` can run without arguments. Values given
//! on the command line or through the environment take precedence over the
//! file.

use crate::archive::Level;
use crate::constants::{CONFIG_BACKUP_NAME, CONFIG_NAME, PKG_NAME};
use crate::file_util::SyncStrategy;
use crate::job::BackupJob;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The on-disk configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Application {
    /// Configuration file version.
    pub version: String,
    #[serde(default)]
    pub backup: Settings,
}

impl Default for Application {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            backup: Settings::default(),
        }
    }
}

/// Job settings. Every field is optional so a partial set can be layered
/// over another.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Directory tree to protect.
    pub source: Option<PathBuf>,
    /// Backup location.
    pub destination: Option<PathBuf>,
    /// Where the archive is written.
    pub archive: Option<PathBuf>,
    pub level: Option<Level>,
    pub strategy: Option<SyncStrategy>,
    /// Validate the trees after every sync.
    pub verify: Option<bool>,
}

impl Settings {
    /// Fields set in `overrides` win over the fields of `self`.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            source: overrides.source.or(self.source),
            destination: overrides.destination.or(self.destination),
            archive: overrides.archive.or(self.archive),
            level: overrides.level.or(self.level),
            strategy: overrides.strategy.or(self.strategy),
            verify: overrides.verify.or(self.verify),
        }
    }

    /// Builds a job, failing if the source or the destination is unset.
    pub fn into_job(self) -> Result<BackupJob> {
        let source = self
            .source
            .ok_or_else(|| Error::config("no source directory configured"))?;
        let destination = self
            .destination
            .ok_or_else(|| Error::config("no destination directory configured"))?;
        let mut job = BackupJob::new(source, destination);
        if let Some(archive) = self.archive {
            job = job.with_archive(archive);
        }
        Ok(job
            .with_level(self.level.unwrap_or_default())
            .with_strategy(self.strategy.unwrap_or_default())
            .with_verify(self.verify.unwrap_or(false)))
    }
}

impl Application {
    /// Loads the configuration file at `path`, or the defaults if there is none.
    pub fn load_from(path: &Path) -> Result<Self> {
        let toml_str = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::io(path, e)),
        };
        toml::from_str(&toml_str)
            .map_err(|e| Error::config(format!("cannot parse '{}': {e}", path.display())))
    }

    /// Writes the configuration to `path` in TOML format.
    ///
    /// Creates the parent directory if it does not exist.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("cannot serialize configuration: {e}")))?;
        let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = io::BufWriter::new(file);
        writer
            .write_all(toml_str.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(path, e))
    }
}

/// Returns the absolute path to the configuration file.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_NAME))
}

/// Returns the path of the backup kept next to the configuration file at `path`.
pub fn backed_config_file(path: &Path) -> PathBuf {
    path.with_file_name(CONFIG_BACKUP_NAME)
}

/// Returns the configuration directory for the application, platform-specific.
#[cfg(not(target_os = "macos"))]
fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(PKG_NAME))
        .ok_or_else(|| Error::config("couldn't locate the configuration directory"))
}

/// Returns the configuration directory for the application, platform-specific.
#[cfg(target_os = "macos")]
fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".config").join(PKG_NAME))
        .ok_or_else(|| Error::config("couldn't get the home directory"))
}

/// Copies the configuration file at `path` next to itself as the backup
/// file, then writes the defaults in its place.
pub fn reset_config_file(path: &Path, backup: &Path) -> Result<()> {
    if path.exists() {
        fs::copy(path, backup).map_err(|e| Error::io(backup, e))?;
    }
    Application::default().write_to(path)
}

/// Restores the configuration saved by the last reset.
pub fn rollback_config_file(path: &Path, backup: &Path) -> Result<()> {
    if !backup.exists() {
        return Err(Error::config(format!(
            "no backup configuration at '{}'",
            backup.display()
        )));
    }
    Application::load_from(backup)?.write_to(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_name() -> anyhow::Result<()> {
        let file = config_file()?;
        assert!(file.ends_with(Path::new(PKG_NAME).join(CONFIG_NAME)));
        let backed = backed_config_file(&file);
        assert!(backed.ends_with(Path::new(PKG_NAME).join(CONFIG_BACKUP_NAME)));
        assert_eq!(
            backed_config_file(Path::new("/tmp/custom.toml")),
            Path::new("/tmp").join(CONFIG_BACKUP_NAME)
        );
        Ok(())
    }

    #[test]
    fn test_load_missing_is_default() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let app = Application::load_from(&temp.path().join("config.toml"))?;
        assert_eq!(app, Application::default());
        assert_eq!(app.version, "1.0");
        Ok(())
    }

    #[test]
    fn test_write_and_load() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nested").join("config.toml");
        let mut app = Application::default();
        app.backup.source = Some(PathBuf::from("/data"));
        app.backup.destination = Some(PathBuf::from("/backup"));
        app.backup.level = Some(Level::Best);
        app.backup.strategy = Some(SyncStrategy::Staged);
        app.write_to(&path)?;

        let toml_str = fs::read_to_string(&path)?;
        assert!(toml_str.contains("version = \"1.0\""));
        assert!(toml_str.contains("strategy = \"staged\""));
        assert_eq!(Application::load_from(&path)?, app);
        Ok(())
    }

    #[test]
    fn test_load_invalid_toml() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.toml");
        fs::write(&path, "version = [")?;
        let res = Application::load_from(&path);
        assert!(matches!(res, Err(Error::Config { .. })));
        Ok(())
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = Settings {
            source: Some(PathBuf::from("/from/file")),
            destination: Some(PathBuf::from("/backup")),
            verify: Some(true),
            ..Default::default()
        };
        let cli = Settings {
            source: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.source, Some(PathBuf::from("/from/cli")));
        assert_eq!(merged.destination, Some(PathBuf::from("/backup")));
        assert_eq!(merged.verify, Some(true));
    }

    #[test]
    fn test_into_job() -> anyhow::Result<()> {
        let missing = Settings {
            source: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert!(matches!(missing.into_job(), Err(Error::Config { .. })));

        let job = Settings {
            source: Some(PathBuf::from("/data")),
            destination: Some(PathBuf::from("/backup")),
            archive: Some(PathBuf::from("/tmp/a.tar.gz")),
            level: Some(Level::Fastest),
            strategy: None,
            verify: Some(true),
        }
        .into_job()?;
        assert_eq!(job.archive_path(), Path::new("/tmp/a.tar.gz"));
        assert_eq!(job.level(), Level::Fastest);
        assert_eq!(job.strategy(), SyncStrategy::Replace);
        assert!(job.verifies());
        Ok(())
    }

    #[test]
    fn test_reset_and_rollback() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.toml");
        let backup = temp.path().join("config_backup.toml");
        assert!(rollback_config_file(&path, &backup).is_err());

        let mut app = Application::default();
        app.backup.source = Some(PathBuf::from("/data"));
        app.write_to(&path)?;

        reset_config_file(&path, &backup)?;
        assert_eq!(Application::load_from(&path)?, Application::default());

        rollback_config_file(&path, &backup)?;
        assert_eq!(Application::load_from(&path)?, app);
        Ok(())
    }
}
