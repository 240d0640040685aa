//! # Error Types
//!
//! This module defines the error type used throughout the filter.

use std::io;
use thiserror::Error;

/// Main error type for filter operations.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Settings could not be resolved (missing, untrusted or unreadable PPD).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The spool file path was rejected or could not be opened.
    #[error("Input error: {0}")]
    Input(String),

    /// The raster stream could not be read.
    #[error("Raster error: {0}")]
    Raster(#[source] io::Error),

    /// Writing to the output sink failed. Always fatal; the shutdown
    /// sequence is not attempted.
    #[error("Output error: {0}")]
    Output(#[source] io::Error),

    /// A page's line width would require a stripe buffer beyond the fixed
    /// capacity bound.
    #[error("Stripe of {bytes_per_line} bytes per line exceeds the {max_bytes}-byte bound")]
    StripeTooLarge {
        bytes_per_line: usize,
        max_bytes: usize,
    },

    /// A stripe chunk computed larger than the allocated buffer.
    #[error("Stripe chunk of {needed} bytes exceeds buffer capacity of {capacity}")]
    StripeOverflow { needed: usize, capacity: usize },
}
