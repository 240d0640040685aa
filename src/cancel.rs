//! # Cooperative Cancellation
//!
//! CUPS stops a job by signalling the filter (SIGTERM on cancel, SIGINT or
//! SIGPIPE when the backend goes away). None of these are treated as
//! immediately fatal: the handler only sets an atomic flag, and the job
//! loops poll it at two checkpoints — before each page and before each
//! stripe chunk — then run the normal shutdown sequence so the printer is
//! left reset.
//!
//! A stripe already being written when the signal lands is flushed whole;
//! the output stream stays well-formed because cancellation never
//! interrupts a frame mid-byte.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::FilterError;

/// Shared cancellation flag, set once per signal and never cleared.
///
/// Clones share the flag. The token is passed explicitly into the page and
/// row loops; only the signal glue below holds a process-wide reference.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Async-signal-safe: a single atomic store.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Token the signal handler flips. Set once at installation; the handler
/// itself does nothing beyond the atomic store.
static SIGNAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn handle_signal(_signal: libc::c_int) {
    if let Some(token) = SIGNAL_TOKEN.get() {
        token.cancel();
    }
}

/// Install SIGTERM/SIGINT/SIGPIPE handlers that set the given token.
///
/// `SA_RESTART` keeps interrupted reads and writes going so the job winds
/// down at the next checkpoint instead of erroring out of an I/O call.
#[cfg(unix)]
pub fn install_signal_handlers(token: &CancelToken) -> Result<(), FilterError> {
    SIGNAL_TOKEN
        .set(token.clone())
        .map_err(|_| FilterError::Config("signal handlers already installed".to_string()))?;

    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);

        for signal in [libc::SIGTERM, libc::SIGINT, libc::SIGPIPE] {
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(FilterError::Config(format!(
                    "sigaction failed: {}",
                    io::Error::last_os_error()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_signal_handlers(token: &CancelToken) -> Result<(), FilterError> {
    // No signal delivery to hook into; the token still works for callers
    // that cancel programmatically.
    let _ = SIGNAL_TOKEN.set(token.clone());
    Ok(())
}
