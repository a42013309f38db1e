//! Command-line interface definition for dbackup.
//!
//! This module defines the CLI commands and the logic that turns their
//! arguments, the environment and the configuration file into a backup job.

use crate::application::{self, Application, Settings};
use crate::archive::Level;
use crate::event::TracingReporter;
use crate::file_util::SyncStrategy;
use crate::inspect::inspect;
use crate::sysexits;
use crate::validate::compare_trees;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

/// Command-line interface definition for dbackup.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Use this configuration file instead of the default one.
    #[arg(long, global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    pub commands: Option<Commands>,
}

/// The two trees of a job. Unset values come from the configuration file.
#[derive(Args, Debug, Default)]
pub struct PathArgs {
    /// Directory tree to protect.
    #[arg(env = "DBK_SOURCE")]
    pub source: Option<PathBuf>,
    /// Backup location.
    #[arg(env = "DBK_DEST")]
    pub destination: Option<PathBuf>,
}

/// Supported dbackup commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace the destination with a copy of the source and archive it.
    Backup {
        #[command(flatten)]
        paths: PathArgs,
        /// Archive file to write.
        #[arg(short, long)]
        archive: Option<PathBuf>,
        /// Archive compression level.
        #[arg(short, long)]
        level: Option<Level>,
        /// How the old destination is replaced.
        #[arg(short, long)]
        strategy: Option<SyncStrategy>,
        /// Compare both trees after copying.
        #[arg(long)]
        verify: bool,
    },
    /// Replace the source with the contents of the destination.
    Restore {
        #[command(flatten)]
        paths: PathArgs,
        /// How the old source is replaced.
        #[arg(short, long)]
        strategy: Option<SyncStrategy>,
        /// Compare both trees after copying.
        #[arg(long)]
        verify: bool,
    },
    /// Check that two directory trees are identical.
    Validate {
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Report whether a directory is missing, empty or non-empty.
    Inspect {
        /// Directory to inspect.
        path: PathBuf,
    },
    /// Show or change the stored configuration.
    Config {
        /// Directory tree to protect.
        #[arg(long, conflicts_with_all = ["reset", "rollback"])]
        source: Option<PathBuf>,
        /// Backup location.
        #[arg(long, conflicts_with_all = ["reset", "rollback"])]
        destination: Option<PathBuf>,
        /// Archive file to write.
        #[arg(long, conflicts_with_all = ["reset", "rollback"])]
        archive: Option<PathBuf>,
        /// Archive compression level.
        #[arg(long, conflicts_with_all = ["reset", "rollback"])]
        level: Option<Level>,
        /// How an old tree is replaced.
        #[arg(long, conflicts_with_all = ["reset", "rollback"])]
        strategy: Option<SyncStrategy>,
        /// Compare both trees after every copy.
        #[arg(long, conflicts_with_all = ["reset", "rollback"])]
        verify: Option<bool>,
        /// Reset the configuration file and back up the file before resetting.
        #[arg(short = 'r', long, conflicts_with = "rollback")]
        reset: bool,
        /// Rollback the last backed up configuration file.
        #[arg(short = 'R', long, conflicts_with = "reset")]
        rollback: bool,
    },
}

/// Runs a parsed command. `config_file` overrides the default configuration path.
pub fn execute(commands: Commands, config_file: Option<&Path>) -> Result<()> {
    match commands {
        Commands::Backup {
            paths,
            archive,
            level,
            strategy,
            verify,
        } => {
            let overrides = Settings {
                archive,
                level,
                strategy,
                verify: verify.then_some(true),
                ..Settings::from(paths)
            };
            back_up(&resolve_config(config_file)?, overrides)
        }
        Commands::Restore {
            paths,
            strategy,
            verify,
        } => {
            let overrides = Settings {
                strategy,
                verify: verify.then_some(true),
                ..Settings::from(paths)
            };
            restore(&resolve_config(config_file)?, overrides)
        }
        Commands::Validate { paths } => validate(&resolve_config(config_file)?, paths.into()),
        Commands::Inspect { path } => {
            let state = inspect(&path)?;
            println!("{state}");
            Ok(())
        }
        Commands::Config {
            source,
            destination,
            archive,
            level,
            strategy,
            verify,
            reset,
            rollback,
        } => {
            let config_file = resolve_config(config_file)?;
            let backup_file = application::backed_config_file(&config_file);
            if reset {
                application::reset_config_file(&config_file, &backup_file)?;
                println!("Configuration file reset successfully!");
                return Ok(());
            }
            if rollback {
                application::rollback_config_file(&config_file, &backup_file)?;
                println!("Configuration file rolled back successfully.");
                return Ok(());
            }
            let changes = Settings {
                source: source.map(absolute).transpose()?,
                destination: destination.map(absolute).transpose()?,
                archive: archive.map(absolute).transpose()?,
                level,
                strategy,
                verify,
            };
            config(&config_file, changes)
        }
    }
}

/// The configuration file given on the command line, or the default one.
fn resolve_config(config_file: Option<&Path>) -> Result<PathBuf> {
    match config_file {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(application::config_file()?),
    }
}

impl From<PathArgs> for Settings {
    fn from(paths: PathArgs) -> Self {
        Settings {
            source: paths.source,
            destination: paths.destination,
            ..Default::default()
        }
    }
}

/// Settings from the configuration file with `overrides` layered on top.
fn load_settings(config_file: &Path, overrides: Settings) -> Result<Settings> {
    let app = Application::load_from(config_file)?;
    Ok(app.backup.merge(overrides))
}

fn back_up(config_file: &Path, overrides: Settings) -> Result<()> {
    let job = load_settings(config_file, overrides)?.into_job()?;
    job.back_up(&mut TracingReporter)
        .with_context(|| format!("Back up of '{}' failed", job.source().display()))?;
    Ok(())
}

fn restore(config_file: &Path, overrides: Settings) -> Result<()> {
    let job = load_settings(config_file, overrides)?.into_job()?;
    job.restore(&mut TracingReporter)
        .with_context(|| format!("Restore of '{}' failed", job.source().display()))?;
    Ok(())
}

/// Prints `identical` or the list of differences. Exits with `EX_DATAERR`
/// when the trees differ.
fn validate(config_file: &Path, overrides: Settings) -> Result<()> {
    let job = load_settings(config_file, overrides)?.into_job()?;
    let diff = compare_trees(job.source(), job.destination());
    println!("{diff}");
    if !diff.is_identical() {
        process::exit(sysexits::EX_DATAERR);
    }
    Ok(())
}

/// Prints the configuration, or stores `changes` when any are given.
fn config(config_file: &Path, changes: Settings) -> Result<()> {
    let mut app = Application::load_from(config_file)?;
    if changes == Settings::default() {
        println!("config file: {}", config_file.display());
        print!("{}", toml::to_string_pretty(&app)?);
        return Ok(());
    }
    app.backup = app.backup.merge(changes);
    app.write_to(config_file)?;
    println!("Configuration saved to {}", config_file.display());
    Ok(())
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    std::path::absolute(&path).with_context(|| format!("The path '{path:?}' is invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_backup() {
        let cli = Cli::parse_from([
            "dbk", "backup", "/data", "/backup", "--level", "best", "--strategy", "staged",
            "--verify",
        ]);
        match cli.commands {
            Some(Commands::Backup {
                paths,
                level,
                strategy,
                verify,
                archive,
            }) => {
                assert_eq!(paths.source, Some(PathBuf::from("/data")));
                assert_eq!(paths.destination, Some(PathBuf::from("/backup")));
                assert_eq!(level, Some(Level::Best));
                assert_eq!(strategy, Some(SyncStrategy::Staged));
                assert!(verify);
                assert!(archive.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_inspect_skips_config_lookup() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        execute(
            Commands::Inspect {
                path: temp.path().to_path_buf(),
            },
            None,
        )?;
        Ok(())
    }

    #[test]
    fn test_resolve_config_prefers_explicit_path() -> anyhow::Result<()> {
        let path = Path::new("/tmp/custom.toml");
        assert_eq!(resolve_config(Some(path))?, path);
        Ok(())
    }

    #[test]
    fn test_config_reset_conflicts_with_values() {
        let res = Cli::try_parse_from(["dbk", "config", "--reset", "--source", "/data"]);
        assert!(res.is_err());
    }
}
