//! # Rastertozj CLI
//!
//! CUPS filter entry point. The scheduler invokes filters with a fixed
//! positional argument list and the raster data on stdin or in a spool
//! file:
//!
//! ```bash
//! rastertozj job-id user title copies options [file]
//! ```
//!
//! The ESC/POS byte stream is written to stdout (which CUPS connects to
//! the printer backend); diagnostics go to stderr. Exit code 0 means at
//! least one page was printed and the job was not cancelled.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::Path;
use std::process;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use rastertozj::cancel::{self, CancelToken};
use rastertozj::config::{self, Settings};
use rastertozj::error::FilterError;
use rastertozj::job::{JobController, JobOutcome};
use rastertozj::raster::CupsRasterReader;

/// Directory prefix an explicit spool file path must live under.
const SPOOL_TRUSTED_PREFIX: &str = "/var/spool/cups/";

/// Rastertozj - CUPS raster to ESC/POS filter
#[derive(Parser, Debug)]
#[command(name = "rastertozj")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CUPS job ID
    job: String,

    /// User who submitted the job
    user: String,

    /// Job title
    title: String,

    /// Number of copies
    copies: String,

    /// Job options from the print dialog
    options: String,

    /// Spool file ("-" or absent means stdin)
    file: Option<String>,
}

fn main() {
    // The CUPS convention is exit code 1 for any usage failure, not clap's
    // default of 2.
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cancel = CancelToken::new();
    if let Err(e) = cancel::install_signal_handlers(&cancel) {
        error!("{e}");
        process::exit(1);
    }

    match run(&cli, &cancel) {
        Ok(outcome) => process::exit(outcome.exit_code()),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli, cancel: &CancelToken) -> Result<JobOutcome, FilterError> {
    debug!(
        job = %cli.job,
        user = %cli.user,
        title = %cli.title,
        copies = %cli.copies,
        "starting job"
    );

    let settings = Settings::resolve(&cli.options)?;
    let input = open_spool(cli.file.as_deref())?;

    let stdout = io::stdout();
    let mut source = CupsRasterReader::new(BufReader::new(input));
    let mut controller = JobController::new(settings, BufWriter::new(stdout.lock()));
    controller.run(&mut source, cancel)
}

/// Open the job's raster input: the spool file when one is named, stdin
/// otherwise. Explicit paths are only accepted from the CUPS spool
/// directory — job metadata is not trusted to name arbitrary files.
fn open_spool(file: Option<&str>) -> Result<Box<dyn Read>, FilterError> {
    match file {
        None | Some("-") => Ok(Box::new(io::stdin())),
        Some(path) => {
            if !config::is_trusted_path(Path::new(path), SPOOL_TRUSTED_PREFIX) {
                return Err(FilterError::Input(format!("untrusted spool path: {path}")));
            }
            let file = File::open(path)
                .map_err(|e| FilterError::Input(format!("cannot open {path}: {e}")))?;
            Ok(Box::new(file))
        }
    }
}
