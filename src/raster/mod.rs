//! # Raster Input
//!
//! This module defines the raster source abstraction the job engine consumes
//! and the native CUPS raster stream reader that implements it.
//!
//! ## Module Structure
//!
//! - [`cups`]: streaming reader for CUPS raster v1/v2/v3 spool data
//!
//! A raster source produces a sequence of pages; each page is a geometry
//! header followed by `height` rows of `bytes_per_line` packed 1-bit pixels.

use std::io;

pub mod cups;

pub use cups::CupsRasterReader;

/// Per-page raster geometry.
///
/// Reported by the source before the page's row data. The engine only
/// prints pages with positive height and line width; anything else ends
/// the job's page loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    /// Page width in pixels.
    pub width: u32,
    /// Page height in rows.
    pub height: u32,
    /// Packed bytes per row.
    pub bytes_per_line: u32,
}

impl PageGeometry {
    /// Whether the geometry describes a printable page.
    #[inline]
    pub fn is_printable(&self) -> bool {
        self.height > 0 && self.bytes_per_line > 0
    }
}

/// A producer of page geometry and row bitmap data for one print job.
///
/// Errors carry `std::io::Error`; the job engine treats source errors as
/// end-of-input (the job still shuts down in order), in contrast to sink
/// errors which are fatal.
pub trait RasterSource {
    /// Advance to the next page and return its geometry, or `None` when the
    /// stream is exhausted.
    fn next_page(&mut self) -> io::Result<Option<PageGeometry>>;

    /// Read the next row of the current page into `row` (sized to the
    /// page's `bytes_per_line`). Returns `false` when the page has no more
    /// row data; the caller treats a short page as end of data, not as an
    /// error.
    fn read_row(&mut self, row: &mut [u8]) -> io::Result<bool>;
}
