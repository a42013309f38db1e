//! dbackup: mirror a directory tree to a backup location, archive it,
//! verify the copy and restore from it.
//!
//! The library exposes each step on its own ([`inspect`](inspect::inspect),
//! [`sync_tree`](file_util::sync_tree), [`archive`](archive::archive),
//! [`validate_trees`](validate::validate_trees)) and [`BackupJob`] to run them
//! in sequence.

pub mod application;
pub mod archive;
pub mod commands;
mod constants;
mod error;
pub mod event;
pub mod file_util;
pub mod inspect;
pub mod job;
pub mod logging;
pub mod sysexits;
pub mod validate;

pub use constants::ARCHIVE_NAME;
pub use error::{Error, Result};
pub use job::BackupJob;
