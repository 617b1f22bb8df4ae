//! Report text parser.
//!
//! Finds the total-duration line (`TOTAL HOURS: 37:15:45`) and the reporting
//! date range (`01/05/2024 - 01/11/2024`) in text extracted from a timesheet
//! export. The two lookups are independent: a report without a date range
//! still parses, and gets the `this week` placeholder label.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Label used when the report text carries no date range.
pub const DEFAULT_DATE_RANGE_LABEL: &str = "this week";

/// Largest hour count the marker pattern can carry (three digits).
pub const MAX_HOURS: u32 = 999;

/// A duration exactly as printed in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDuration {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl RawDuration {
    /// Build a duration, rejecting values the report format cannot produce.
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Result<Self, ParseError> {
        if hours > MAX_HOURS || minutes > 59 || seconds > 59 {
            return Err(ParseError::OutOfRange(format!(
                "{}:{:02}:{:02}",
                hours, minutes, seconds
            )));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
        })
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}

/// Where a parsed report came from, used when rendering the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub date_range_label: String,
    pub source_file_name: String,
}

/// Errors from report text parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("total duration marker not found (expected a line like \"TOTAL HOURS: 12:34:56\"), so this does not look like a valid export")]
    MarkerNotFound,
    #[error("total duration {0} is out of range")]
    OutOfRange(String),
}

// Compile-once regex patterns via OnceLock.
fn re_total_duration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Separator run excludes digits so a 4-digit hour count cannot match its tail.
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\btotal\s+hours?[\s:=.\-\x{2013}]*(?P<h>\d{1,3}):(?P<m>\d{2}):(?P<s>\d{2})\b",
        )
        .unwrap()
    })
}

fn re_date_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?P<start>\d{2}/\d{2}/\d{4})\s*-\s*(?P<end>\d{2}/\d{2}/\d{4})\b").unwrap()
    })
}

/// Extract the total duration from report text.
///
/// The first marker match wins. Values with single-digit minutes or seconds
/// (`1:5:30`) simply do not match.
pub fn parse_total_duration(text: &str) -> Result<RawDuration, ParseError> {
    let caps = re_total_duration()
        .captures(text)
        .ok_or(ParseError::MarkerNotFound)?;

    // The pattern guarantees 1-3 / 2 / 2 ASCII digits, so these cannot overflow.
    let field = |name: &str| -> u32 { caps[name].parse().unwrap_or_default() };

    RawDuration::new(field("h"), field("m"), field("s"))
}

/// Extract the reporting date range, normalized to `MM/DD/YYYY - MM/DD/YYYY`.
pub fn parse_date_range(text: &str) -> Option<String> {
    re_date_range()
        .captures(text)
        .map(|caps| format!("{} - {}", &caps["start"], &caps["end"]))
}

/// Date range label for the summary, falling back to the placeholder.
pub fn date_range_label(text: &str) -> String {
    parse_date_range(text).unwrap_or_else(|| DEFAULT_DATE_RANGE_LABEL.to_string())
}

/// Parse both the duration and its context out of one report.
pub fn parse_report(
    text: &str,
    source_file_name: &str,
) -> Result<(RawDuration, ReportContext), ParseError> {
    let duration = parse_total_duration(text)?;
    let context = ReportContext {
        date_range_label: date_range_label(text),
        source_file_name: source_file_name.to_string(),
    };
    Ok((duration, context))
}
