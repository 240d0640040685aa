//! # Job Control
//!
//! The job-level state machine that sequences printer commands around the
//! stripe engine:
//!
//! ```text
//! Init ──► PerPage ──► PageEnd ──┐
//!  │          ▲                  │
//!  │          └──────────────────┘ (more pages, not cancelled)
//!  └────────► Shutdown ──► Terminal
//! ```
//!
//! - **Init**: configured drawer kicks, then printer reset
//! - **PerPage**: page header → stripe loop (see [`stripe`])
//! - **PageEnd**: configured feed and cut
//! - **Shutdown**: configured cut and drawer kicks, final printer reset —
//!   runs after cancellation, source errors and stripe-capacity aborts
//!   alike; only an output write failure skips it
//! - **Terminal**: exit 0 iff at least one page was fully processed and no
//!   cancellation occurred
//!
//! ## Module Structure
//!
//! - [`stripe`]: the stripe buffer and page encoder

use std::io::Write;

use tracing::{debug, error};

use crate::cancel::CancelToken;
use crate::config::{CutMode, DrawerMode, Settings};
use crate::error::FilterError;
use crate::protocol::{Command, CommandEmitter};
use crate::raster::RasterSource;

pub mod stripe;

pub use stripe::{StripeBuffer, StripeEncoder};

/// How a job ended. Produced by [`JobController::run`]; the process exit
/// code is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    /// Pages fully encoded (a page abandoned mid-stripe does not count).
    pub pages: u32,
    /// Whether cancellation was observed.
    pub cancelled: bool,
}

impl JobOutcome {
    /// Exit code per the CUPS filter convention: success only when at
    /// least one page was processed and the job was not cancelled.
    pub fn exit_code(&self) -> i32 {
        if self.pages > 0 && !self.cancelled { 0 } else { 1 }
    }
}

/// # Job Controller
///
/// Owns the resolved [`Settings`] and the output emitter for the job's
/// lifetime, and drives the state machine over a raster source.
pub struct JobController<W: Write> {
    settings: Settings,
    emitter: CommandEmitter<W>,
}

impl<W: Write> JobController<W> {
    pub fn new(settings: Settings, sink: W) -> Self {
        Self {
            settings,
            emitter: CommandEmitter::new(sink),
        }
    }

    /// Run one job to completion.
    ///
    /// The page loop ends on: source exhaustion, an unreadable or invalid
    /// page header, a stripe-capacity violation, or cancellation. All of
    /// these still reach the shutdown sequence. Output errors propagate
    /// immediately — the stream to the printer is already broken, so no
    /// shutdown bytes are attempted.
    pub fn run(
        &mut self,
        source: &mut dyn RasterSource,
        cancel: &CancelToken,
    ) -> Result<JobOutcome, FilterError> {
        self.job_setup()?;

        let mut pages = 0u32;
        let mut stripe: Option<StripeBuffer> = None;

        while !cancel.is_cancelled() {
            let page = match source.next_page() {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    debug!("raster stream ended: {e}");
                    break;
                }
            };
            if !page.is_printable() {
                debug!(
                    height = page.height,
                    bytes_per_line = page.bytes_per_line,
                    "invalid page geometry, ending job"
                );
                break;
            }

            // Size the stripe buffer lazily, and re-size it if a later page
            // changes its line width.
            let bytes_per_line = page.bytes_per_line as usize;
            let buffer = match &mut stripe {
                Some(buffer) if buffer.bytes_per_line() == bytes_per_line => buffer,
                slot => match StripeBuffer::new(bytes_per_line) {
                    Ok(buffer) => slot.insert(buffer),
                    Err(e) => {
                        error!("{e}");
                        break;
                    }
                },
            };

            debug!(page = pages + 1, width = page.width, height = page.height, "printing page");
            match StripeEncoder::new(buffer, &mut self.emitter).encode_page(source, &page, cancel)
            {
                Ok(()) => pages += 1,
                Err(e @ FilterError::Output(_)) => return Err(e),
                Err(e) => {
                    error!("abandoning page: {e}");
                    break;
                }
            }
            self.page_end()?;
        }

        self.job_shutdown()?;
        self.emitter.flush()?;

        let outcome = JobOutcome {
            pages,
            cancelled: cancel.is_cancelled(),
        };
        debug!(pages = outcome.pages, cancelled = outcome.cancelled, "job finished");
        Ok(outcome)
    }

    /// Job-setup commands: configured drawer kicks, then printer reset.
    fn job_setup(&mut self) -> Result<(), FilterError> {
        if self.settings.drawer_1 == DrawerMode::JobStart {
            self.emitter.command(Command::OpenDrawer1)?;
        }
        if self.settings.drawer_2 == DrawerMode::JobStart {
            self.emitter.command(Command::OpenDrawer2)?;
        }
        self.emitter.command(Command::Init)
    }

    /// Page-end commands: configured feed distance, then optional cut.
    fn page_end(&mut self) -> Result<(), FilterError> {
        for _ in 0..self.settings.feed_dist {
            self.emitter.feed_line()?;
        }
        if self.settings.cutting == CutMode::PageEnd {
            self.emitter.command(Command::FullCut)?;
        }
        Ok(())
    }

    /// Job-shutdown commands: optional cut and drawer kicks, final reset.
    fn job_shutdown(&mut self) -> Result<(), FilterError> {
        if self.settings.cutting == CutMode::JobEnd {
            self.emitter.command(Command::FullCut)?;
        }
        if self.settings.drawer_1 == DrawerMode::JobEnd {
            self.emitter.command(Command::OpenDrawer1)?;
        }
        if self.settings.drawer_2 == DrawerMode::JobEnd {
            self.emitter.command(Command::OpenDrawer2)?;
        }
        self.emitter.command(Command::Init)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PageGeometry;
    use pretty_assertions::assert_eq;
    use std::io;

    const INIT: &[u8] = &[0x1B, 0x40];
    const CUT: &[u8] = &[0x1D, 0x56, 0x01];
    const FEED: &[u8] = &[0x1B, 0x4A, 0x18];
    const DRAWER_1: &[u8] = &[0x1B, 0x70, 0x00, 0x19, 0xFA];
    const DRAWER_2: &[u8] = &[0x1B, 0x70, 0x01, 0x19, 0xFA];

    /// In-memory source: a list of pages, each geometry plus row data.
    struct PageSource {
        pages: Vec<(PageGeometry, Vec<Vec<u8>>)>,
        page: usize,
        row: usize,
    }

    impl PageSource {
        fn new(pages: Vec<(PageGeometry, Vec<Vec<u8>>)>) -> Self {
            Self {
                pages,
                page: 0,
                row: 0,
            }
        }
    }

    impl RasterSource for PageSource {
        fn next_page(&mut self) -> io::Result<Option<PageGeometry>> {
            match self.pages.get(self.page) {
                Some((geometry, _)) => {
                    self.page += 1;
                    self.row = 0;
                    Ok(Some(*geometry))
                }
                None => Ok(None),
            }
        }

        fn read_row(&mut self, row: &mut [u8]) -> io::Result<bool> {
            let rows = &self.pages[self.page - 1].1;
            match rows.get(self.row) {
                Some(data) => {
                    row.copy_from_slice(data);
                    self.row += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn one_page(width: u32, rows: Vec<Vec<u8>>) -> PageSource {
        let geometry = PageGeometry {
            width,
            height: rows.len() as u32,
            bytes_per_line: rows.first().map_or(1, |r| r.len() as u32),
        };
        PageSource::new(vec![(geometry, rows)])
    }

    fn run_job(settings: Settings, source: &mut PageSource) -> (Vec<u8>, JobOutcome) {
        run_job_with(settings, source, &CancelToken::new())
    }

    fn run_job_with(
        settings: Settings,
        source: &mut PageSource,
        cancel: &CancelToken,
    ) -> (Vec<u8>, JobOutcome) {
        let mut out = Vec::new();
        let outcome = JobController::new(settings, &mut out)
            .run(source, cancel)
            .unwrap();
        (out, outcome)
    }

    #[test]
    fn test_blank_single_row_page() {
        // One 1-row, 1-byte page, all zero: frame elided, no feed configured.
        let mut source = one_page(1, vec![vec![0x00]]);
        let (out, outcome) = run_job(Settings::default(), &mut source);

        let expected: Vec<u8> = [INIT, INIT].concat();
        assert_eq!(out, expected);
        assert_eq!(outcome, JobOutcome { pages: 1, cancelled: false });
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_single_black_row_with_feed_and_cut() {
        let settings = Settings {
            feed_dist: 2,
            cutting: CutMode::PageEnd,
            ..Settings::default()
        };
        let mut source = one_page(1, vec![vec![0xFF]]);
        let (out, outcome) = run_job(settings, &mut source);

        let frame: &[u8] = &[
            0x1D, 0x76, 0x30, 0x00, // raster start
            0x01, 0x00, 0x01, 0x00, // width 1, rows 1
            0xFF, // bitmap
            0x1B, 0x4A, 0x00, // row feed
        ];
        let expected: Vec<u8> = [INIT, frame, FEED, FEED, CUT, INIT].concat();
        assert_eq!(out, expected);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_zero_height_page_counts_nothing() {
        let geometry = PageGeometry {
            width: 8,
            height: 0,
            bytes_per_line: 1,
        };
        let mut source = PageSource::new(vec![(geometry, vec![])]);
        let (out, outcome) = run_job(Settings::default(), &mut source);

        // Setup and shutdown only; no page end commands.
        assert_eq!(out, [INIT, INIT].concat());
        assert_eq!(outcome.pages, 0);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_empty_source_exits_nonzero() {
        let mut source = PageSource::new(vec![]);
        let (_, outcome) = run_job(Settings::default(), &mut source);
        assert_eq!(outcome.pages, 0);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_drawer_kicks_at_job_start() {
        let settings = Settings {
            drawer_1: DrawerMode::JobStart,
            drawer_2: DrawerMode::JobStart,
            ..Settings::default()
        };
        let mut source = one_page(1, vec![vec![0x00]]);
        let (out, _) = run_job(settings, &mut source);
        assert_eq!(out, [DRAWER_1, DRAWER_2, INIT, INIT].concat());
    }

    #[test]
    fn test_drawer_kicks_at_job_end() {
        let settings = Settings {
            drawer_1: DrawerMode::JobEnd,
            ..Settings::default()
        };
        let mut source = one_page(1, vec![vec![0x00]]);
        let (out, _) = run_job(settings, &mut source);
        // Drawer kick sits between the pages and the final reset.
        assert_eq!(out, [INIT, DRAWER_1, INIT].concat());
    }

    #[test]
    fn test_cut_at_job_end_not_page_end() {
        let settings = Settings {
            cutting: CutMode::JobEnd,
            ..Settings::default()
        };
        let geometry = PageGeometry {
            width: 8,
            height: 1,
            bytes_per_line: 1,
        };
        let mut source = PageSource::new(vec![
            (geometry, vec![vec![0x00]]),
            (geometry, vec![vec![0x00]]),
        ]);
        let (out, outcome) = run_job(settings, &mut source);

        // One cut total, in the shutdown sequence.
        assert_eq!(out, [INIT, CUT, INIT].concat());
        assert_eq!(outcome.pages, 2);
    }

    #[test]
    fn test_feed_once_per_page() {
        let settings = Settings {
            feed_dist: 1,
            ..Settings::default()
        };
        let geometry = PageGeometry {
            width: 8,
            height: 1,
            bytes_per_line: 1,
        };
        let mut source = PageSource::new(vec![
            (geometry, vec![vec![0x00]]),
            (geometry, vec![vec![0x00]]),
        ]);
        let (out, _) = run_job(settings, &mut source);
        assert_eq!(out, [INIT, FEED, FEED, INIT].concat());
    }

    #[test]
    fn test_pre_cancelled_job_prints_no_pages() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut source = one_page(1, vec![vec![0xFF]]);
        let (out, outcome) = run_job_with(Settings::default(), &mut source, &cancel);

        // Setup and shutdown still bracket the (empty) job.
        assert_eq!(out, [INIT, INIT].concat());
        assert_eq!(outcome, JobOutcome { pages: 0, cancelled: true });
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_cancelled_job_with_pages_exits_nonzero() {
        // Cancel raised after the first page was read.
        struct CancellingSource {
            inner: PageSource,
            cancel: CancelToken,
        }
        impl RasterSource for CancellingSource {
            fn next_page(&mut self) -> io::Result<Option<PageGeometry>> {
                self.inner.next_page()
            }
            fn read_row(&mut self, row: &mut [u8]) -> io::Result<bool> {
                let got = self.inner.read_row(row)?;
                self.cancel.cancel();
                Ok(got)
            }
        }

        let cancel = CancelToken::new();
        let mut source = CancellingSource {
            inner: one_page(8, vec![vec![0xFF]; 48]),
            cancel: cancel.clone(),
        };
        let mut out = Vec::new();
        let outcome = JobController::new(Settings::default(), &mut out)
            .run(&mut source, &cancel)
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.exit_code(), 1);
        // Shutdown reset is still the final bytes.
        assert_eq!(&out[out.len() - 2..], INIT);
    }

    #[test]
    fn test_oversized_line_width_aborts_job() {
        let geometry = PageGeometry {
            width: 65536,
            height: 1,
            bytes_per_line: 8192, // 8192 × 24 > 65536
        };
        let mut source = PageSource::new(vec![(geometry, vec![vec![0u8; 8192]])]);
        let (out, outcome) = run_job(Settings::default(), &mut source);

        assert_eq!(out, [INIT, INIT].concat());
        assert_eq!(outcome.pages, 0);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_line_width_change_reallocates() {
        let wide = PageGeometry {
            width: 16,
            height: 1,
            bytes_per_line: 2,
        };
        let narrow = PageGeometry {
            width: 8,
            height: 1,
            bytes_per_line: 1,
        };
        let mut source = PageSource::new(vec![
            (wide, vec![vec![0xFF, 0xFF]]),
            (narrow, vec![vec![0xFF]]),
        ]);
        let (out, outcome) = run_job(Settings::default(), &mut source);

        assert_eq!(outcome.pages, 2);
        let frame_1: &[u8] = &[
            0x1D, 0x76, 0x30, 0x00, 0x10, 0x00, 0x01, 0x00, 0xFF, 0xFF, 0x1B, 0x4A, 0x00,
        ];
        let frame_2: &[u8] = &[
            0x1D, 0x76, 0x30, 0x00, 0x08, 0x00, 0x01, 0x00, 0xFF, 0x1B, 0x4A, 0x00,
        ];
        assert_eq!(out, [INIT, frame_1, frame_2, INIT].concat());
    }

    #[test]
    fn test_write_failure_skips_shutdown() {
        struct FailAfter {
            remaining: usize,
        }
        impl io::Write for FailAfter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if self.remaining == 0 {
                    return Err(io::Error::from(io::ErrorKind::BrokenPipe));
                }
                let n = buf.len().min(self.remaining);
                self.remaining -= n;
                Ok(n)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        // Enough budget for setup Init, then fail inside the frame.
        let mut source = one_page(1, vec![vec![0xFF]]);
        let result = JobController::new(Settings::default(), FailAfter { remaining: 4 })
            .run(&mut source, &CancelToken::new());
        assert!(matches!(result, Err(FilterError::Output(_))));
    }
}
