//! # ESC/POS Printer Commands
//!
//! This module implements the fixed command set used by Zijiang ZJ-58/ZJ-80
//! thermal receipt printers and the emitter that writes it to the job's
//! output sink.
//!
//! ## Protocol Overview
//!
//! ESC/POS is a byte-oriented protocol where commands are short escape
//! sequences. The filter only needs a closed set of them:
//!
//! - **Initialize**: reset the printer at job start and job end
//! - **Raster**: print a stripe of packed 1-bit graphics
//! - **Feed**: advance paper in line-feed units
//! - **Cut**: full cut at the current position
//! - **Drawer kick**: pulse a cash drawer solenoid
//!
//! ## Escape Sequence Structure
//!
//! - Two bytes: `ESC @`
//! - Multi-byte with parameters: `ESC J n`, `ESC p m t1 t2`
//! - GS-prefixed: `GS V n`, `GS v 0 m xL xH yL yH d1...dk`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding: `u16` value 0x1234
//! is sent as bytes `[0x34, 0x12]`.

use std::io::Write;

use crate::error::FilterError;

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
///
/// Most ESC/POS commands begin with ESC (0x1B). This byte signals the start
/// of a control sequence rather than printable text.
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for cutter and raster graphics commands:
/// - Hex: 0x1D, Decimal: 29
pub const GS: u8 = 0x1D;

// ============================================================================
// COMMAND TABLE
// ============================================================================

/// # Fixed Printer Commands
///
/// The closed set of command kinds the filter emits. Each kind maps to an
/// immutable byte sequence via [`Command::bytes`]; the sequences are
/// protocol constants and are reproduced byte-exact.
///
/// | Kind | ASCII | Hex |
/// |------|-------|-----|
/// | Init | ESC @ | 1B 40 |
/// | FullCut | GS V 1 | 1D 56 01 |
/// | RasterStart | GS v 0 0 | 1D 76 30 00 |
/// | OpenDrawer1 | ESC p 0 25 250 | 1B 70 00 19 FA |
/// | OpenDrawer2 | ESC p 1 25 250 | 1B 70 01 19 FA |
///
/// ## Drawer Kick Timing
///
/// `ESC p m t1 t2` pulses drawer connector pin `m` for t1×2ms on and
/// t2×2ms off. The fixed 0x19/0xFA pair (50ms/500ms) matches the solenoid
/// timing the ZJ drivers ship with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Initialize printer (ESC @). Resets to default state.
    Init,
    /// Full cut at current position (GS V 1).
    FullCut,
    /// Raster frame introducer (GS v 0, mode 0 = normal density).
    RasterStart,
    /// Kick cash drawer 1 (ESC p 0 25 250).
    OpenDrawer1,
    /// Kick cash drawer 2 (ESC p 1 25 250).
    OpenDrawer2,
}

impl Command {
    /// The exact byte sequence for this command kind.
    ///
    /// ## Example
    ///
    /// ```
    /// use rastertozj::protocol::Command;
    ///
    /// assert_eq!(Command::Init.bytes(), &[0x1B, 0x40]);
    /// ```
    #[inline]
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Command::Init => &[ESC, b'@'],
            Command::FullCut => &[GS, b'V', 0x01],
            Command::RasterStart => &[GS, b'v', b'0', 0x00],
            Command::OpenDrawer1 => &[ESC, b'p', 0x00, 0x19, 0xFA],
            Command::OpenDrawer2 => &[ESC, b'p', 0x01, 0x19, 0xFA],
        }
    }
}

// ============================================================================
// PAPER FEED
// ============================================================================

/// Feed amount for one page-end line feed (`ESC J 24`).
///
/// 24 dot-rows matches one full stripe height, so page-end feeds advance
/// the paper by whole stripes.
pub const LINE_FEED_UNITS: u8 = 24;

/// # Feed Paper (ESC J n)
///
/// Feeds paper forward by n dot-rows.
///
/// | Format  | Bytes   |
/// |---------|---------|
/// | ASCII   | ESC J n |
/// | Hex     | 1B 4A n |
/// | Decimal | 27 74 n |
///
/// `feed(0)` is the raster frame terminator: it commits the buffered
/// raster data to paper without advancing further.
///
/// ## Example
///
/// ```
/// use rastertozj::protocol::commands::feed;
///
/// assert_eq!(feed(24), [0x1B, 0x4A, 24]);
/// assert_eq!(feed(0), [0x1B, 0x4A, 0]);
/// ```
#[inline]
pub const fn feed(units: u8) -> [u8; 3] {
    [ESC, b'J', units]
}

/// Encode a u16 value as little-endian bytes [low, high].
///
/// ## Example
///
/// ```
/// use rastertozj::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// assert_eq!(u16_le(384), [0x80, 0x01]); // Common width: 384 dots
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// COMMAND EMITTER
// ============================================================================

/// # Command Emitter
///
/// Writes commands and raster frames to the job's output sink. Every write
/// failure is fatal to the job ([`FilterError::Output`]): the byte stream
/// already sent to the printer cannot be rewound, so there is nothing to
/// retry.
///
/// ## Example
///
/// ```
/// use rastertozj::protocol::{Command, CommandEmitter};
///
/// let mut out = Vec::new();
/// let mut emitter = CommandEmitter::new(&mut out);
/// emitter.command(Command::FullCut)?;
/// assert_eq!(out, vec![0x1D, 0x56, 0x01]);
/// # Ok::<(), rastertozj::FilterError>(())
/// ```
pub struct CommandEmitter<W: Write> {
    sink: W,
}

impl<W: Write> CommandEmitter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Emit the exact byte sequence for a command kind.
    pub fn command(&mut self, command: Command) -> Result<(), FilterError> {
        self.sink
            .write_all(command.bytes())
            .map_err(FilterError::Output)
    }

    /// Emit one complete raster frame:
    ///
    /// ```text
    /// GS v 0 0 | width LE16 | rows LE16 | packed bitmap bytes | ESC J 0
    /// ```
    ///
    /// `width` is the page width in dots, `rows` the number of bitmap rows
    /// actually packed into `data`. The trailing `ESC J 0` commits the
    /// frame to paper without extra feed.
    pub fn raster_frame(&mut self, width: u16, rows: u16, data: &[u8]) -> Result<(), FilterError> {
        self.command(Command::RasterStart)?;
        self.write(&u16_le(width))?;
        self.write(&u16_le(rows))?;
        self.write(data)?;
        self.write(&feed(0))
    }

    /// Emit one page-end line feed (`ESC J 24`).
    pub fn feed_line(&mut self) -> Result<(), FilterError> {
        self.write(&feed(LINE_FEED_UNITS))
    }

    /// Flush the sink. A buffered sink may surface an earlier write failure
    /// here, so the job treats flush errors exactly like write errors.
    pub fn flush(&mut self) -> Result<(), FilterError> {
        self.sink.flush().map_err(FilterError::Output)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), FilterError> {
        self.sink.write_all(bytes).map_err(FilterError::Output)
    }
}

// ============================================================================
// TESTS
// ============================================================================
