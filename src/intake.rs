//! Intake gate for uploaded files.
//!
//! Decides whether an inbound event carries a report worth processing. Most
//! rejections are silent: chatter and unrelated uploads in the intake channel
//! should not get a reply. The one exception is the day restriction, where
//! the sender is told why nothing happened.

use chrono::{DateTime, Datelike, TimeZone, Weekday};

use crate::extract::declares_pdf;
use crate::notification::day_restriction_notice;
use crate::types::{EventFile, InboundEvent, RelayConfig};

pub use crate::extract::PDF_MIME_TYPE;

/// Filter settings for the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakePolicy {
    /// Lowercased filename fragments that identify a report export.
    pub keywords: Vec<String>,
    pub direct_messages_only: bool,
    /// When set, reports are only accepted on this weekday.
    pub restrict_to_day: Option<Weekday>,
}

impl IntakePolicy {
    pub fn from_config(config: &RelayConfig, deadline_day: Weekday) -> Self {
        Self {
            keywords: config
                .report_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            direct_messages_only: config.direct_messages_only,
            restrict_to_day: config.restrict_to_deadline_day.then_some(deadline_day),
        }
    }
}

/// Why an event was dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoFiles,
    NoDocument,
    UnrecognizedFilename,
    NotDirectMessage,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoFiles => write!(f, "no files attached"),
            RejectReason::NoDocument => write!(f, "no PDF attachment"),
            RejectReason::UnrecognizedFilename => write!(f, "filename is not a recognized export"),
            RejectReason::NotDirectMessage => write!(f, "not a direct message"),
        }
    }
}

/// Result of running an event through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeDecision {
    /// Dropped without telling the sender.
    FilteredOut(RejectReason),
    /// Dropped, and the sender gets `notice`.
    FilteredOutNotified { notice: String },
    /// Proceeds to download and parsing.
    Accepted(EventFile),
}

fn is_document(file: &EventFile) -> bool {
    declares_pdf(&file.name, &file.mime_type)
}

fn is_recognized_export(file: &EventFile, keywords: &[String]) -> bool {
    let name = file.name.to_lowercase();
    keywords.iter().any(|k| name.contains(k.as_str()))
}

/// Run an event through the gate at wall-clock time `now`.
///
/// `now` should be in the configured zone so the weekday check matches the
/// sender's calendar.
pub fn evaluate<Tz: TimeZone>(
    event: &InboundEvent,
    policy: &IntakePolicy,
    now: &DateTime<Tz>,
) -> IntakeDecision {
    if !event.has_files() {
        return IntakeDecision::FilteredOut(RejectReason::NoFiles);
    }

    let documents: Vec<&EventFile> = event.files.iter().filter(|f| is_document(f)).collect();
    if documents.is_empty() {
        return IntakeDecision::FilteredOut(RejectReason::NoDocument);
    }

    let Some(candidate) = documents
        .into_iter()
        .find(|f| is_recognized_export(f, &policy.keywords))
    else {
        return IntakeDecision::FilteredOut(RejectReason::UnrecognizedFilename);
    };

    if policy.direct_messages_only && !event.is_direct_message() {
        return IntakeDecision::FilteredOut(RejectReason::NotDirectMessage);
    }

    if let Some(day) = policy.restrict_to_day {
        if now.weekday() != day {
            return IntakeDecision::FilteredOutNotified {
                notice: day_restriction_notice(day),
            };
        }
    }

    IntakeDecision::Accepted(candidate.clone())
}
