//! # CUPS Raster Stream Reader
//!
//! Streaming reader for the CUPS raster spool format, implementing
//! [`RasterSource`] over any `Read`.
//!
//! ## Stream Layout
//!
//! A spool file is a 4-byte sync word followed by pages; each page is a
//! fixed-size header followed by its row data:
//!
//! | Sync word | Version | Header | Row data |
//! |-----------|---------|--------|----------|
//! | `RaSt` / `tSaR` | v1 | 420 bytes | uncompressed |
//! | `RaS2` / `2SaR` | v2 | 1796 bytes | PackBits-style RLE |
//! | `RaS3` / `3SaR` | v3 | 1796 bytes | uncompressed |
//!
//! The sync word also fixes the byte order of all header integers
//! (`RaSt` = big-endian, `tSaR` = little-endian, and so on). The v1 header
//! layout is a prefix of the v2 header, so the field offsets below apply to
//! every version.
//!
//! ## Header Fields Consumed
//!
//! | Offset | Field |
//! |--------|-------|
//! | 372 | cupsWidth (pixels) |
//! | 376 | cupsHeight (rows) |
//! | 388 | cupsBitsPerPixel |
//! | 392 | cupsBytesPerLine |
//! | 400 | cupsColorSpace |
//!
//! ## RLE Scheme (v2)
//!
//! Each line starts with a repeat byte `r` (the line is output `r + 1`
//! times), followed by blocks until the line is full:
//!
//! - code `0x00..=0x7F`: one pixel chunk follows, repeated `code + 1` times
//! - code `0x80`: fill the rest of the line with the color-space fill byte
//! - code `0x81..=0xFF`: `257 - code` literal pixel chunks follow
//!
//! A pixel chunk is `max(1, bits_per_pixel / 8)` bytes; for the 1-bit
//! monochrome pages this filter prints it is always a single byte.
//!
//! ## End-of-Stream Behavior
//!
//! Sync-word detection is deferred to the first page read, so callers can
//! emit job-setup bytes before touching the input. A clean end of input
//! yields `None` from [`RasterSource::next_page`]; short row data yields a
//! short read from [`RasterSource::read_row`]. Both end the page sequence
//! without raising an error — the job's page count is the caller's signal
//! that nothing was printed.

use std::io::{self, Read};

use tracing::debug;

use super::{PageGeometry, RasterSource};

/// Upper bound on the bytes-per-line a page header may declare.
///
/// Guards line-buffer allocation against corrupt headers; far wider than
/// any receipt printer's line.
pub const MAX_BYTES_PER_LINE: u32 = 1 << 20;

const V1_HEADER_LEN: usize = 420;
const V2_HEADER_LEN: usize = 1796;

const OFFSET_WIDTH: usize = 372;
const OFFSET_HEIGHT: usize = 376;
const OFFSET_BITS_PER_PIXEL: usize = 388;
const OFFSET_BYTES_PER_LINE: usize = 392;
const OFFSET_COLOR_SPACE: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Stream version and byte order, decoded from the sync word.
#[derive(Debug, Clone, Copy)]
struct StreamFormat {
    order: ByteOrder,
    compressed: bool,
    header_len: usize,
}

impl StreamFormat {
    fn from_sync_word(word: [u8; 4]) -> Option<Self> {
        let (order, version) = match &word {
            b"RaSt" => (ByteOrder::BigEndian, 1),
            b"tSaR" => (ByteOrder::LittleEndian, 1),
            b"RaS2" => (ByteOrder::BigEndian, 2),
            b"2SaR" => (ByteOrder::LittleEndian, 2),
            b"RaS3" => (ByteOrder::BigEndian, 3),
            b"3SaR" => (ByteOrder::LittleEndian, 3),
            _ => return None,
        };
        Some(StreamFormat {
            order,
            compressed: version == 2,
            header_len: if version == 1 {
                V1_HEADER_LEN
            } else {
                V2_HEADER_LEN
            },
        })
    }

    fn read_u32(&self, header: &[u8], offset: usize) -> u32 {
        let bytes: [u8; 4] = header[offset..offset + 4].try_into().unwrap_or([0; 4]);
        match self.order {
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
        }
    }
}

/// Decode state for the page currently being read.
struct PageState {
    bytes_per_line: usize,
    rows_remaining: u32,
    /// Pixel chunk size in bytes (RLE run unit).
    chunk_size: usize,
    /// Fill byte for the 0x80 "rest of line" code; depends on whether the
    /// color space encodes white as 0x00 or 0xFF.
    fill_byte: u8,
    /// Last decoded line (compressed streams only).
    line: Vec<u8>,
    /// Remaining copies of `line` still to serve.
    line_repeat: u8,
    /// Scratch space for one pixel chunk.
    chunk: Vec<u8>,
}

/// # CUPS Raster Reader
///
/// Decodes a CUPS raster stream page by page. One page's rows must be
/// consumed (or the job abandoned) before the next page header is read;
/// the reader does not seek.
///
/// ## Example
///
/// ```no_run
/// use std::io::BufReader;
/// use rastertozj::raster::{CupsRasterReader, RasterSource};
///
/// let stdin = std::io::stdin();
/// let mut source = CupsRasterReader::new(BufReader::new(stdin.lock()));
/// while let Some(page) = source.next_page()? {
///     let mut row = vec![0u8; page.bytes_per_line as usize];
///     while source.read_row(&mut row)? {
///         // process row...
///     }
/// }
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct CupsRasterReader<R: Read> {
    reader: R,
    format: Option<StreamFormat>,
    page: Option<PageState>,
}

impl<R: Read> CupsRasterReader<R> {
    /// Wrap a byte stream. No input is consumed until the first
    /// [`next_page`](RasterSource::next_page) call.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            format: None,
            page: None,
        }
    }

    /// Read and decode the sync word. `None` on immediate end of input.
    fn read_sync_word(&mut self) -> io::Result<Option<StreamFormat>> {
        let mut word = [0u8; 4];
        if !read_fully(&mut self.reader, &mut word)? {
            return Ok(None);
        }
        match StreamFormat::from_sync_word(word) {
            Some(format) => Ok(Some(format)),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid raster sync word",
            )),
        }
    }
}

impl<R: Read> RasterSource for CupsRasterReader<R> {
    fn next_page(&mut self) -> io::Result<Option<PageGeometry>> {
        let format = match self.format {
            Some(format) => format,
            None => match self.read_sync_word()? {
                Some(format) => *self.format.insert(format),
                None => return Ok(None),
            },
        };
        self.page = None;

        let mut header = vec![0u8; format.header_len];
        if !read_fully(&mut self.reader, &mut header)? {
            return Ok(None);
        }

        let geometry = PageGeometry {
            width: format.read_u32(&header, OFFSET_WIDTH),
            height: format.read_u32(&header, OFFSET_HEIGHT),
            bytes_per_line: format.read_u32(&header, OFFSET_BYTES_PER_LINE),
        };
        let bits_per_pixel = format.read_u32(&header, OFFSET_BITS_PER_PIXEL);
        let color_space = format.read_u32(&header, OFFSET_COLOR_SPACE);
        debug!(
            width = geometry.width,
            height = geometry.height,
            bytes_per_line = geometry.bytes_per_line,
            bits_per_pixel,
            "raster page header"
        );

        if geometry.bytes_per_line > MAX_BYTES_PER_LINE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bytes per line exceeds limit",
            ));
        }

        let bytes_per_line = geometry.bytes_per_line as usize;
        let chunk_size = (bits_per_pixel as usize).div_ceil(8).max(1);
        self.page = Some(PageState {
            bytes_per_line,
            rows_remaining: geometry.height,
            chunk_size,
            fill_byte: fill_byte_for(color_space),
            line: if format.compressed {
                vec![0u8; bytes_per_line]
            } else {
                Vec::new()
            },
            line_repeat: 0,
            chunk: vec![0u8; chunk_size],
        });
        Ok(Some(geometry))
    }

    fn read_row(&mut self, row: &mut [u8]) -> io::Result<bool> {
        let Some(format) = self.format else {
            return Ok(false);
        };
        let Some(page) = self.page.as_mut() else {
            return Ok(false);
        };
        if page.rows_remaining == 0 {
            return Ok(false);
        }

        let produced = if format.compressed {
            decode_rle_row(&mut self.reader, page, row)?
        } else {
            match read_fully(&mut self.reader, row) {
                Ok(full) => full,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
                Err(e) => return Err(e),
            }
        };

        if produced {
            page.rows_remaining -= 1;
        } else {
            // Short page: stop serving rows so the caller sees a clean end.
            page.rows_remaining = 0;
        }
        Ok(produced)
    }
}

/// Decode one RLE line into `row`, serving cached line repeats first.
///
/// Returns `false` when the stream ends at a line boundary (or mid-line:
/// truncated data ends the page the same way a short uncompressed read
/// does). Corrupt run lengths that would overflow the line are an error.
fn decode_rle_row<R: Read>(
    reader: &mut R,
    page: &mut PageState,
    row: &mut [u8],
) -> io::Result<bool> {
    if page.line_repeat > 0 {
        page.line_repeat -= 1;
        row.copy_from_slice(&page.line);
        return Ok(true);
    }

    let mut repeat = [0u8; 1];
    if !read_fully(reader, &mut repeat)? {
        return Ok(false);
    }

    let mut pos = 0usize;
    while pos < page.line.len() {
        let mut code = [0u8; 1];
        if !read_fully(reader, &mut code)? {
            return Ok(false);
        }
        match code[0] {
            run @ 0x00..=0x7F => {
                let count = run as usize + 1;
                let len = count * page.chunk_size;
                if pos + len > page.line.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "pixel run overflows line",
                    ));
                }
                if !read_exact_or_end(reader, &mut page.chunk)? {
                    return Ok(false);
                }
                for _ in 0..count {
                    page.line[pos..pos + page.chunk_size].copy_from_slice(&page.chunk);
                    pos += page.chunk_size;
                }
            }
            0x80 => {
                // Reset the rest of the line to white.
                let fill = page.fill_byte;
                page.line[pos..].fill(fill);
                pos = page.line.len();
            }
            literal => {
                let count = 257 - literal as usize;
                let len = count * page.chunk_size;
                if pos + len > page.line.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "literal run overflows line",
                    ));
                }
                if !read_exact_or_end(reader, &mut page.line[pos..pos + len])? {
                    return Ok(false);
                }
                pos += len;
            }
        }
    }

    page.line_repeat = repeat[0];
    row.copy_from_slice(&page.line);
    Ok(true)
}

/// White is 0xFF in additive color spaces and 0x00 in ink-coverage spaces.
fn fill_byte_for(color_space: u32) -> u8 {
    match color_space {
        // Gray, RGB, RGBA, CIELab, RGBW, sGray, sRGB, AdobeRGB
        0 | 1 | 2 | 16 | 17 | 18 | 19 | 20 => 0xFF,
        _ => 0x00,
    }
}

/// Fill `buf` from the reader. `Ok(false)` on end-of-input before the first
/// byte; `UnexpectedEof` if the stream ends partway through.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated raster data",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Like [`read_fully`] but any end-of-input maps to `Ok(false)`.
fn read_exact_or_end<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match read_fully(reader, buf) {
        Ok(full) => Ok(full),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

// ============================================================================
// TESTS
// ============================================================================
