//! Utility functions for date parsing, text normalisation and file system checks.
//!
//! - Date parsing against one or several `strftime` formats
//! - Catalan relative times ("Fa 3 hores") as shown in some comment threads
//! - Category normalisation (diacritics and case folded away)
//! - String truncation for logging and output directory validation

use crate::error::ExtractError;
use chrono::{Duration, Months, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Parse a date-time string against an ordered list of formats.
///
/// Each format is tried in order and the first successful parse wins. The raw
/// string is trimmed first.
///
/// # Errors
///
/// [`ExtractError::UnparseableDate`] when no format matches.
///
/// # Examples
///
/// ```ignore
/// let formats = ["%d/%m/%y %H:%M".to_string(), "%d/%m/%Y %H:%M".to_string()];
/// parse_datetime("15/01/2024 10:30", &formats)?; // second format
/// ```
pub fn parse_datetime(raw: &str, formats: &[String]) -> Result<NaiveDateTime, ExtractError> {
    let trimmed = raw.trim();
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
        .ok_or_else(|| ExtractError::UnparseableDate {
            raw: trimmed.to_string(),
            formats: formats.to_vec(),
        })
}

static RELATIVE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*fa\s+(\d+|una?|unes|uns)\s+(\p{L}+)").expect("relative time regex")
});

/// Resolve a Catalan relative time ("Fa 2 hores", "Fa un minut") against `now`.
///
/// Returns `None` when the phrase is not recognised.
pub fn parse_relative(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = RELATIVE_TIME.captures(raw)?;
    let amount: i64 = match caps[1].to_lowercase().as_str() {
        "un" | "una" | "uns" | "unes" => 1,
        n => n.parse().ok()?,
    };
    let unit = caps[2].to_lowercase();

    if unit.starts_with("seg") {
        now.checked_sub_signed(Duration::seconds(amount))
    } else if unit.starts_with("min") {
        now.checked_sub_signed(Duration::minutes(amount))
    } else if unit.starts_with("hor") {
        now.checked_sub_signed(Duration::hours(amount))
    } else if unit.starts_with("dia") || unit.starts_with("die") {
        now.checked_sub_signed(Duration::days(amount))
    } else if unit.starts_with("setman") {
        now.checked_sub_signed(Duration::weeks(amount))
    } else if unit.starts_with("mes") {
        now.checked_sub_months(Months::new(u32::try_from(amount).ok()?))
    } else if unit.starts_with("any") {
        now.checked_sub_months(Months::new(u32::try_from(amount).ok()?.checked_mul(12)?))
    } else {
        None
    }
}

/// Strip diacritics, lowercase and trim a category label.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_category(" Opinió "), "opinio");
/// assert_eq!(normalize_category("NOTÍCIA"), "noticia");
/// ```
pub fn normalize_category(raw: &str) -> String {
    raw.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a character
/// boundary) with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
