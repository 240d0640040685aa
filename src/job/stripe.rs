//! # Stripe Encoding
//!
//! The core raster-to-command engine: accumulates page rows into a
//! fixed-capacity stripe buffer, elides blank stripes, and frames the rest
//! as raster commands.
//!
//! ## Stripe Geometry
//!
//! A stripe is up to 24 consecutive rows packed contiguously at the page's
//! bytes-per-line stride:
//!
//! ```text
//! Row 0:    d[0]            ... d[bpl-1]
//! Row 1:    d[bpl]          ... d[2*bpl-1]
//! ...
//! Row n-1:  d[(n-1)*bpl]    ... d[n*bpl-1]      n ≤ 24
//! ```
//!
//! The buffer is allocated once per line width (bytes-per-line × 24 bytes,
//! bounded at 64KB) and reused for every stripe of the job.
//!
//! ## Blank Elision
//!
//! A stripe whose packed bytes are all zero is never emitted. Thermal
//! printers feed much faster than they print, so skipping blank vertical
//! regions shrinks both the output stream and the print time. The row-feed
//! accounting still covers elided stripes: the paper position is advanced
//! by the page-end feed commands, not per stripe.

use std::io::Write;

use tracing::trace;

use crate::cancel::CancelToken;
use crate::error::FilterError;
use crate::protocol::CommandEmitter;
use crate::raster::{PageGeometry, RasterSource};

/// Rows per stripe. Matches the printer's internal band height.
pub const STRIPE_ROWS: usize = 24;

/// Hard bound on the stripe buffer size in bytes.
pub const MAX_STRIPE_BYTES: usize = 65536;

/// # Stripe Buffer
///
/// A bounded, reusable row accumulator. Capacity is checked at
/// construction: a line width that cannot fit 24 rows under
/// [`MAX_STRIPE_BYTES`] is rejected before any allocation.
pub struct StripeBuffer {
    data: Vec<u8>,
    bytes_per_line: usize,
}

impl StripeBuffer {
    /// Allocate a buffer for stripes of the given line width.
    ///
    /// ## Errors
    ///
    /// [`FilterError::StripeTooLarge`] when `bytes_per_line × 24` exceeds
    /// [`MAX_STRIPE_BYTES`].
    pub fn new(bytes_per_line: usize) -> Result<Self, FilterError> {
        let capacity = bytes_per_line
            .checked_mul(STRIPE_ROWS)
            .filter(|&capacity| capacity <= MAX_STRIPE_BYTES)
            .ok_or(FilterError::StripeTooLarge {
                bytes_per_line,
                max_bytes: MAX_STRIPE_BYTES,
            })?;
        Ok(Self {
            data: vec![0u8; capacity],
            bytes_per_line,
        })
    }

    /// Line width this buffer was sized for.
    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    /// Allocated capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Byte count of an n-row chunk, rounded up to the next multiple of 8.
    #[inline]
    fn padded_len(&self, rows: usize) -> usize {
        (rows * self.bytes_per_line + 7) & !7
    }

    /// Fill the buffer with up to `rows` rows from the source.
    ///
    /// Returns the number of rows actually read; fewer than requested means
    /// the source ran out of page data. The padded chunk size is checked
    /// against capacity before any row is read.
    pub fn fill(
        &mut self,
        source: &mut dyn RasterSource,
        rows: usize,
    ) -> Result<usize, FilterError> {
        let needed = self.padded_len(rows);
        if needed > self.data.len() {
            return Err(FilterError::StripeOverflow {
                needed,
                capacity: self.data.len(),
            });
        }

        let mut filled = 0;
        for row in 0..rows {
            let start = row * self.bytes_per_line;
            let end = start + self.bytes_per_line;
            match source.read_row(&mut self.data[start..end]) {
                Ok(true) => filled += 1,
                Ok(false) => break,
                Err(e) => return Err(FilterError::Raster(e)),
            }
        }
        Ok(filled)
    }

    /// The packed bytes of the first `rows` rows.
    #[inline]
    pub fn packed(&self, rows: usize) -> &[u8] {
        &self.data[..rows * self.bytes_per_line]
    }

    /// Whether the first `rows` rows are entirely zero.
    #[inline]
    pub fn is_blank(&self, rows: usize) -> bool {
        self.packed(rows).iter().all(|&byte| byte == 0)
    }
}

/// # Stripe Encoder
///
/// Drives one page through the stripe buffer, emitting a raster frame per
/// non-blank stripe. The buffer and emitter are borrowed for the duration
/// of the page; the job controller owns both across pages.
pub struct StripeEncoder<'a, W: Write> {
    stripe: &'a mut StripeBuffer,
    emitter: &'a mut CommandEmitter<W>,
}

impl<'a, W: Write> StripeEncoder<'a, W> {
    pub fn new(stripe: &'a mut StripeBuffer, emitter: &'a mut CommandEmitter<W>) -> Self {
        Self { stripe, emitter }
    }

    /// Encode a full page as zero or more raster frames.
    ///
    /// Processes the page in chunks of at most [`STRIPE_ROWS`] rows:
    /// each chunk is read, scanned, and either elided (all zero) or framed
    /// with its *actual* row count — the final chunk of a page is usually
    /// short. Stops early when the source runs out of rows or the
    /// cancellation token is set; both leave the job in a state where the
    /// shutdown sequence still runs.
    pub fn encode_page(
        &mut self,
        source: &mut dyn RasterSource,
        page: &PageGeometry,
        cancel: &CancelToken,
    ) -> Result<(), FilterError> {
        let height = page.height as usize;
        let mut row = 0usize;

        while row < height {
            if cancel.is_cancelled() {
                break;
            }
            let chunk = STRIPE_ROWS.min(height - row);
            let read = self.stripe.fill(source, chunk)?;
            if read == 0 {
                break;
            }

            if self.stripe.is_blank(read) {
                trace!(row, rows = read, "blank stripe elided");
            } else {
                self.emitter.raster_frame(
                    page.width as u16,
                    read as u16,
                    self.stripe.packed(read),
                )?;
            }

            row += read;
            if read < chunk {
                // Source ran short: the page has no more data.
                break;
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
