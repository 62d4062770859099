//! cmdbsync - Device42 to Freshservice CMDB synchronization
//!
//! Reads the mapping file, runs every enabled task once, and writes a
//! per-run log file. Only a logging setup failure exits non-zero; errors
//! during the run are logged and the run ends normally.

use std::path::{Path, PathBuf};

use clap::Parser;
use cmdbsync_core::load_config;
use cmdbsync_engine::{run_tasks, SyncContext};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

mod logging;

/// Synchronize Device42 records into the Freshservice CMDB
#[derive(Debug, Parser)]
#[command(name = "cmdbsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Mapping file
    #[arg(short, long, default_value = "mapping.xml")]
    config: PathBuf,

    /// Folder the run log is written to
    #[arg(short, long, default_value = ".")]
    logfolder: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    println!("Running...");

    let level = logging::level_for(cli.debug, cli.quiet);
    let log_path = match logging::init_logging(&cli.logfolder, level) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        }
    };

    let span = info_span!("run", run_id = %Uuid::new_v4());
    run(&cli.config).instrument(span).await;

    println!("Completed! View log at {}", log_path.display());
    println!("Done");
}

async fn run(config_path: &Path) {
    info!(config = %config_path.display(), "Loading mapping file");
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(config = %config_path.display(), error = %e, "Error loading mapping file");
            return;
        }
    };

    let mut ctx = match SyncContext::from_settings(&config.settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Error creating backend clients");
            return;
        }
    };

    match run_tasks(&mut ctx, &config).await {
        Ok(reports) => {
            let failed: usize = reports.iter().map(|r| r.stats.failed).sum();
            info!(tasks = reports.len(), failed_records = failed, "Sync finished");
        }
        Err(e) => error!(error = %e, "Sync aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["cmdbsync"]).unwrap();
        assert!(!cli.debug);
        assert!(!cli.quiet);
        assert_eq!(cli.config, PathBuf::from("mapping.xml"));
        assert_eq!(cli.logfolder, PathBuf::from("."));
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["cmdbsync", "-d", "-c", "prod.xml", "-l", "/var/log/sync"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, PathBuf::from("prod.xml"));
        assert_eq!(cli.logfolder, PathBuf::from("/var/log/sync"));

        let cli = Cli::try_parse_from(["cmdbsync", "--quiet", "--logfolder", "logs"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.logfolder, PathBuf::from("logs"));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["cmdbsync", "--verbose"]).is_err());
    }
}
