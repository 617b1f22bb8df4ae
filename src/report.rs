//! Report text to summary message, with no I/O.

use crate::notification::format_summary;
use crate::parser::{parse_report, ParseError, RawDuration, ReportContext};
use crate::rounding::{round_duration, RoundedDuration};

/// Everything derived from one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub raw: RawDuration,
    pub rounded: RoundedDuration,
    pub context: ReportContext,
    /// Message relayed to the recipient.
    pub message: String,
}

/// Parse, round and format a report's extracted text.
pub fn summarize(
    text: &str,
    employee_name: &str,
    source_file_name: &str,
) -> Result<ReportSummary, ParseError> {
    let (raw, context) = parse_report(text, source_file_name)?;
    let rounded = round_duration(&raw);
    let message = format_summary(employee_name, &rounded, &context.date_range_label);

    Ok(ReportSummary {
        raw,
        rounded,
        context,
        message,
    })
}
