//! # Job Settings
//!
//! Resolves the per-job settings record from the printer's PPD file and the
//! job's option string.
//!
//! ## Resolution Order
//!
//! 1. The `PPD` environment variable names the device-capabilities file;
//!    its path must live under the trusted `/etc/cups/ppd/` prefix.
//! 2. `*Default<Keyword>: <choice>` lines in the PPD supply defaults.
//! 3. The job's fifth argument (whitespace-separated `Name=Value` pairs,
//!    as the scheduler passes them) overrides the defaults.
//!
//! ## Keywords
//!
//! | Keyword | Choices |
//! |---------|---------|
//! | CashDrawer1Setting | 0 = off, 1 = open at job start, 2 = open at job end |
//! | CashDrawer2Setting | 0 = off, 1 = open at job start, 2 = open at job end |
//! | BlankSpace | 0 / 1 (recorded for diagnostics) |
//! | FeedDist | page-end feed count (ESC J 24 repetitions) |
//! | Cutting | 0 = off, 1 = cut at page end, 2 = cut at job end |
//!
//! Choice values are read with leading-integer semantics: `"2"` is 2,
//! `"2up"` is 2, anything non-numeric is 0.

use std::env;
use std::fs;
use std::path::{Component, Path};

use tracing::debug;

use crate::error::FilterError;

/// Environment variable naming the PPD file.
pub const PPD_ENV: &str = "PPD";

/// Directory prefix a PPD path must live under.
pub const PPD_TRUSTED_PREFIX: &str = "/etc/cups/ppd/";

/// When a cash drawer is kicked, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawerMode {
    #[default]
    Off,
    JobStart,
    JobEnd,
}

impl DrawerMode {
    fn from_choice(choice: i32) -> Self {
        match choice {
            1 => DrawerMode::JobStart,
            2 => DrawerMode::JobEnd,
            _ => DrawerMode::Off,
        }
    }
}

/// When the paper is cut, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutMode {
    #[default]
    Off,
    PageEnd,
    JobEnd,
}

impl CutMode {
    fn from_choice(choice: i32) -> Self {
        match choice {
            1 => CutMode::PageEnd,
            2 => CutMode::JobEnd,
            _ => CutMode::Off,
        }
    }
}

/// Resolved job settings. Built once at job start, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    pub drawer_1: DrawerMode,
    pub drawer_2: DrawerMode,
    /// BlankSpace choice from the PPD. The engine's blank-stripe elision is
    /// unconditional; the flag is carried for diagnostics.
    pub blank_space: bool,
    /// Page-end feed count.
    pub feed_dist: u32,
    pub cutting: CutMode,
}

impl Settings {
    /// Resolve settings for a job: trusted PPD path from the environment,
    /// defaults from the PPD, overrides from the job options string.
    pub fn resolve(options: &str) -> Result<Self, FilterError> {
        let path = env::var(PPD_ENV)
            .map_err(|_| FilterError::Config("PPD environment variable is not set".to_string()))?;
        if !is_trusted_path(Path::new(&path), PPD_TRUSTED_PREFIX) {
            return Err(FilterError::Config(format!("untrusted PPD path: {path}")));
        }
        let ppd = fs::read_to_string(&path)
            .map_err(|e| FilterError::Config(format!("cannot read PPD {path}: {e}")))?;
        Ok(Self::from_ppd(&ppd, options))
    }

    /// Build settings from PPD text plus a job options string.
    pub fn from_ppd(ppd: &str, options: &str) -> Self {
        let choice = |keyword: &str| {
            job_option(options, keyword)
                .or_else(|| ppd_default(ppd, keyword))
                .map(leading_int)
                .unwrap_or(0)
        };

        let settings = Settings {
            drawer_1: DrawerMode::from_choice(choice("CashDrawer1Setting")),
            drawer_2: DrawerMode::from_choice(choice("CashDrawer2Setting")),
            blank_space: choice("BlankSpace") != 0,
            feed_dist: choice("FeedDist").max(0) as u32,
            cutting: CutMode::from_choice(choice("Cutting")),
        };
        debug!(?settings, "resolved job settings");
        settings
    }
}

/// Whether `path` lives under the trusted directory prefix.
///
/// Paths containing `..` components are rejected outright: a prefix check
/// alone would pass `/etc/cups/ppd/../../shadow`.
pub fn is_trusted_path(path: &Path, prefix: &str) -> bool {
    path.starts_with(prefix)
        && !path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
}

/// Look up `*Default<keyword>:` in the PPD text.
fn ppd_default<'a>(ppd: &'a str, keyword: &str) -> Option<&'a str> {
    for line in ppd.lines() {
        let Some(rest) = line.trim_start().strip_prefix("*Default") else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(keyword) else {
            continue;
        };
        let Some(value) = rest.strip_prefix(':') else {
            continue;
        };
        return Some(value.trim().trim_matches('"'));
    }
    None
}

/// Look up a `Name=Value` pair in the job options string. A bare `Name`
/// token reads as "true" (and therefore as choice 0).
fn job_option<'a>(options: &'a str, keyword: &str) -> Option<&'a str> {
    for token in options.split_whitespace() {
        match token.split_once('=') {
            Some((name, value)) if name == keyword => {
                return Some(value.trim_matches('"'));
            }
            None if token == keyword => return Some("true"),
            _ => {}
        }
    }
    None
}

/// Leading-integer parse: `"2"` → 2, `"2up"` → 2, `"x"` → 0, `"-3"` → -3.
fn leading_int(s: &str) -> i32 {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i32>().map(|v| sign * v).unwrap_or(0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PPD: &str = "\
*PPD-Adobe: \"4.3\"
*ModelName: \"Zijiang ZJ-58\"
*DefaultCashDrawer1Setting: 1
*DefaultCashDrawer2Setting: 0
*DefaultBlankSpace: 1
*DefaultFeedDist: 3
*DefaultCutting: 1
*CashDrawer1Setting 0/Off: \"\"
*CashDrawer1Setting 1/Open before printing: \"\"
";

    #[test]
    fn test_defaults_from_ppd() {
        let settings = Settings::from_ppd(PPD, "");
        assert_eq!(
            settings,
            Settings {
                drawer_1: DrawerMode::JobStart,
                drawer_2: DrawerMode::Off,
                blank_space: true,
                feed_dist: 3,
                cutting: CutMode::PageEnd,
            }
        );
    }

    #[test]
    fn test_job_options_override_defaults() {
        let settings = Settings::from_ppd(PPD, "Cutting=2 FeedDist=0 CashDrawer1Setting=2");
        assert_eq!(settings.cutting, CutMode::JobEnd);
        assert_eq!(settings.feed_dist, 0);
        assert_eq!(settings.drawer_1, DrawerMode::JobEnd);
        // Untouched options keep the PPD default.
        assert_eq!(settings.drawer_2, DrawerMode::Off);
    }

    #[test]
    fn test_quoted_option_values() {
        let settings = Settings::from_ppd(PPD, "Cutting=\"2\"");
        assert_eq!(settings.cutting, CutMode::JobEnd);
    }

    #[test]
    fn test_bare_option_reads_as_zero() {
        // cupsParseOptions maps a bare name to "true"; atoi("true") is 0.
        let settings = Settings::from_ppd(PPD, "Cutting");
        assert_eq!(settings.cutting, CutMode::Off);
    }

    #[test]
    fn test_missing_everything_is_all_off() {
        let settings = Settings::from_ppd("", "");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_unknown_choice_maps_to_off() {
        let settings = Settings::from_ppd("*DefaultCutting: 9\n", "");
        assert_eq!(settings.cutting, CutMode::Off);
    }

    #[test]
    fn test_negative_feed_dist_clamps_to_zero() {
        let settings = Settings::from_ppd("*DefaultFeedDist: -2\n", "");
        assert_eq!(settings.feed_dist, 0);
    }

    #[test]
    fn test_keyword_prefix_does_not_match() {
        // "Cutting" must not pick up "CuttingExtra".
        let settings = Settings::from_ppd("*DefaultCuttingExtra: 2\n", "");
        assert_eq!(settings.cutting, CutMode::Off);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("2"), 2);
        assert_eq!(leading_int(" 2 "), 2);
        assert_eq!(leading_int("2up"), 2);
        assert_eq!(leading_int("-3"), -3);
        assert_eq!(leading_int("true"), 0);
        assert_eq!(leading_int(""), 0);
    }

    #[test]
    fn test_trusted_paths() {
        assert!(is_trusted_path(
            Path::new("/etc/cups/ppd/zj58.ppd"),
            PPD_TRUSTED_PREFIX
        ));
        assert!(!is_trusted_path(Path::new("/tmp/zj58.ppd"), PPD_TRUSTED_PREFIX));
        assert!(!is_trusted_path(
            Path::new("/etc/cups/ppd/../../passwd"),
            PPD_TRUSTED_PREFIX
        ));
        assert!(!is_trusted_path(
            Path::new("/etc/cups/ppd-evil/zj58.ppd"),
            PPD_TRUSTED_PREFIX
        ));
    }
}
