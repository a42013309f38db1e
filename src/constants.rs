/// File name of the archive written by every backup run.
pub const ARCHIVE_NAME: &str = "src_archive.tar.gz";
/// Default configuration file name.
pub(crate) const CONFIG_NAME: &str = "config.toml";
/// Backup configuration file name.
pub(crate) const CONFIG_BACKUP_NAME: &str = "config_backup.toml";
/// Package name.
pub(crate) const PKG_NAME: &str = env!("CARGO_PKG_NAME");
