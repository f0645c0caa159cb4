//! ossback CLI: thin glue that parses flags, loads config, and drives one of the two
//! top-level flows. No algorithmic content lives here (spec.md §1, §6).

use clap::Parser;
use std::process::ExitCode;

use ossback::cli::{Cli, Mode};
use ossback::config::BackupConfig;
use ossback::remote::FsObjectStore;
use ossback::session::Session;
use ossback::{logging, orchestrator};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::log_user_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> ossback::Result<()> {
    let mode = cli.mode()?;
    let config = BackupConfig::load(&cli.config)?;

    // The real object-store SDK is an external collaborator out of scope for this
    // crate (spec.md §1b); `FsObjectStore` rooted at the configured bucket name
    // stands in for it here, the way the store trait's own fixture tests use it.
    let store = Box::new(FsObjectStore::new(&config.oss.bucket_name));
    let mut session = Session::new(config, store);

    match mode {
        Mode::Backup => {
            let report = orchestrator::run_backup(&mut session)?;
            log::info!(
                "backup complete: {} file(s) indexed, {} skipped, {} chunk(s) uploaded, manifest {}",
                report.files_indexed,
                report.files_skipped,
                report.chunks_uploaded,
                report.manifest_key
            );
            if !report.is_success() {
                return Err(ossback::BackupError::RunIncomplete(format!(
                    "{} upload(s) failed",
                    report.upload_failures.len()
                )));
            }
        }
        Mode::Restore { timestamp, path } => {
            let report = orchestrator::run_restore(&session, &timestamp, &path)?;
            log::info!(
                "restore complete: {} file(s) restored",
                report.files_restored
            );
            if !report.is_success() {
                return Err(ossback::BackupError::RunIncomplete(format!(
                    "{} restore(s) failed",
                    report.restore_failures.len()
                )));
            }
        }
    }
    Ok(())
}
