//! # ESC/POS Protocol Implementation
//!
//! This module provides the command catalogue and byte emitter for the
//! ESC/POS dialect spoken by Zijiang ZJ-58/ZJ-80 thermal receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: The fixed command table (init, cut, drawer kicks, raster
//!   start), feed builders, and the [`commands::CommandEmitter`] that writes
//!   commands and raster frames to the output sink
//!
//! ## Usage Example
//!
//! ```
//! use rastertozj::protocol::{Command, CommandEmitter};
//!
//! let mut out = Vec::new();
//! {
//!     let mut emitter = CommandEmitter::new(&mut out);
//!
//!     // Initialize printer
//!     emitter.command(Command::Init)?;
//!
//!     // One 8-dot-wide, 1-row raster frame, all dots on
//!     emitter.raster_frame(8, 1, &[0xFF])?;
//!
//!     // Feed one line and cut
//!     emitter.feed_line()?;
//!     emitter.command(Command::FullCut)?;
//! }
//! assert_eq!(&out[..2], &[0x1B, 0x40]);
//! # Ok::<(), rastertozj::FilterError>(())
//! ```
//!
//! ## Protocol Reference
//!
//! Command sequences follow the Zijiang ESC/POS command set as implemented
//! by the ZJ-58 and ZJ-80 families (Epson ESC/POS compatible subset).

pub mod commands;

pub use commands::{Command, CommandEmitter};
