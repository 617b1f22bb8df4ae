//! Message text for the relay
//!
//! Renders the weekly summary sent to the recipient and the shorter notices
//! sent back to the employee (reminders, day restriction, failures).

use chrono::Weekday;

use crate::error::RelayError;
use crate::rounding::RoundedDuration;

/// Longest underlying error text quoted back to the sender.
const MAX_REASON_CHARS: usize = 200;

fn plural(count: u32, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Human phrase for a rounded duration, e.g. `2 hours 1 minute`.
///
/// Zero-valued clauses are dropped; a fully zero duration reads `0 minutes`.
pub fn duration_phrase(duration: &RoundedDuration) -> String {
    let mut parts = Vec::with_capacity(2);
    if duration.hours > 0 {
        parts.push(plural(duration.hours, "hour"));
    }
    if duration.minutes > 0 {
        parts.push(plural(duration.minutes, "minute"));
    }
    if parts.is_empty() {
        return "0 minutes".to_string();
    }
    parts.join(" ")
}

/// The summary relayed to the recipient.
pub fn format_summary(name: &str, duration: &RoundedDuration, date_range: &str) -> String {
    format!(
        "{}'s time for week of {}: *{}*",
        name,
        date_range,
        duration_phrase(duration)
    )
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Deadline reminder when no report arrived this week.
pub fn reminder_text(name: &str) -> String {
    format!(
        "Hi {}, I haven't received your timesheet report this week yet. Please upload your summary export when you get a chance.",
        name
    )
}

/// Visible notice for an upload that arrived on the wrong day.
pub fn day_restriction_notice(day: Weekday) -> String {
    format!(
        "Reports are only processed on {}s. Please upload this file again on {}.",
        weekday_name(day),
        weekday_name(day)
    )
}

/// Notice sent back to the employee when a report could not be relayed.
pub fn failure_notice(file_name: &str, err: &RelayError) -> String {
    format!(
        "Couldn't process {}: {} {}",
        file_name,
        truncate_reason(&err.to_string()),
        err.recovery_suggestion()
    )
}

/// Confirmation sent back to the employee after a successful relay.
pub fn relayed_ack(summary: &str) -> String {
    format!("Got it! I sent this along: {}", summary)
}

fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_REASON_CHARS {
        return reason.to_string();
    }
    let cut: String = reason.chars().take(MAX_REASON_CHARS).collect();
    format!("{}...", cut)
}
