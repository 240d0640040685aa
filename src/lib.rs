//! # Rastertozj - CUPS Raster Filter for ESC/POS Thermal Printers
//!
//! Rastertozj converts a CUPS raster job into the ESC/POS command stream
//! spoken by Zijiang ZJ-58/ZJ-80 thermal receipt printers. It provides:
//!
//! - **Protocol implementation**: the fixed command table and frame emitter
//! - **Stripe engine**: bounded-memory row accumulation with blank elision
//! - **Job control**: the setup → per-page → shutdown state machine
//! - **Raster input**: a native CUPS raster v1/v2/v3 stream reader
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::io::{self, BufReader, BufWriter};
//! use rastertozj::{
//!     cancel::CancelToken,
//!     config::Settings,
//!     job::JobController,
//!     raster::CupsRasterReader,
//! };
//!
//! // Resolve settings from the PPD named by the environment
//! let settings = Settings::resolve("FeedDist=2 Cutting=1")?;
//!
//! // Transcode stdin to stdout
//! let stdin = io::stdin();
//! let stdout = io::stdout();
//! let mut source = CupsRasterReader::new(BufReader::new(stdin.lock()));
//! let mut controller = JobController::new(settings, BufWriter::new(stdout.lock()));
//!
//! let outcome = controller.run(&mut source, &CancelToken::new())?;
//! std::process::exit(outcome.exit_code());
//! # Ok::<(), rastertozj::FilterError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS command table and emitter |
//! | [`job`] | Job state machine and stripe engine |
//! | [`raster`] | Raster source trait and CUPS stream reader |
//! | [`config`] | PPD-backed settings resolution |
//! | [`cancel`] | Cooperative cancellation token and signal glue |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Tested against the ZJ-58 (58mm, 384 dots) and ZJ-80 (80mm, 576 dots)
//! families. Other printers accepting the `GS v 0` raster command and the
//! standard drawer-kick/cut sequences should work unmodified.

pub mod cancel;
pub mod config;
pub mod error;
pub mod job;
pub mod protocol;
pub mod raster;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use config::Settings;
pub use error::FilterError;
pub use job::{JobController, JobOutcome};
