//! CLI surface (spec.md §6): thin glue selecting a mode and supplying parameters to
//! the orchestrator. Carries no algorithmic content of its own.

use clap::Parser;
use std::path::PathBuf;

use crate::error::BackupError;

/// Incremental, content-addressed backup of a directory tree to a remote object store.
#[derive(Clone, Debug, Parser)]
#[command(name = "ossback")]
#[command(about = "Back up a directory tree to a remote object store, or restore a prior snapshot.")]
pub struct Cli {
    /// Full sync (backup) mode.
    #[arg(short = 's', long = "sync")]
    pub sync: bool,

    /// Restore mode.
    #[arg(short = 'r', long = "restore")]
    pub restore: bool,

    /// Restore manifest selector (required with `-r`).
    #[arg(short = 't', long = "timestamp")]
    pub timestamp: Option<String>,

    /// Restore destination directory (required with `-r`).
    #[arg(short = 'p', long = "path")]
    pub path: Option<PathBuf>,

    /// Config file name, without extension. Default: `config` (loads `config.toml`).
    #[arg(short = 'c', long = "config", default_value = "config")]
    pub config: String,

    /// Verbose (debug-level) logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// The run the CLI resolved to, after validating the flag combination.
pub enum Mode {
    Backup,
    Restore { timestamp: String, path: PathBuf },
}

impl Cli {
    /// Validate the flag combination and resolve it to a [`Mode`].
    ///
    /// Exactly one of `-s`/`-r` must be given; `-r` additionally requires both `-t`
    /// and `-p`.
    pub fn mode(&self) -> Result<Mode, BackupError> {
        match (self.sync, self.restore) {
            (true, true) => Err(BackupError::ConfigInvalid(
                "-s and -r are mutually exclusive".to_string(),
            )),
            (false, false) => Err(BackupError::ConfigInvalid(
                "one of -s (backup) or -r (restore) is required".to_string(),
            )),
            (true, false) => Ok(Mode::Backup),
            (false, true) => {
                let timestamp = self.timestamp.clone().ok_or_else(|| {
                    BackupError::ConfigInvalid("-r requires -t <timestamp>".to_string())
                })?;
                let path = self.path.clone().ok_or_else(|| {
                    BackupError::ConfigInvalid("-r requires -p <path>".to_string())
                })?;
                Ok(Mode::Restore { timestamp, path })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["ossback"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn sync_alone_resolves_to_backup() {
        assert!(matches!(cli(&["-s"]).mode().unwrap(), Mode::Backup));
    }

    #[test]
    fn restore_requires_timestamp_and_path() {
        assert!(cli(&["-r"]).mode().is_err());
        assert!(cli(&["-r", "-t", "2026"]).mode().is_err());
        assert!(matches!(
            cli(&["-r", "-t", "2026", "-p", "/tmp/out"]).mode().unwrap(),
            Mode::Restore { .. }
        ));
    }

    #[test]
    fn neither_flag_is_an_error() {
        assert!(cli(&[]).mode().is_err());
    }

    #[test]
    fn both_flags_is_an_error() {
        assert!(cli(&["-s", "-r"]).mode().is_err());
    }

    #[test]
    fn config_name_defaults_to_config() {
        assert_eq!(cli(&["-s"]).config, "config");
    }
}
