//! Report relay pipeline
//!
//! One inbound event is carried through the whole pipeline before the next:
//! intake gate, download, text extraction, parse/round/format, delivery to
//! the recipient, tracker update. The two scheduled jobs (deadline reminder
//! and weekly reset) also live here so they share the same tracker and
//! delivery path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RelayError;
use crate::extract::TextExtractor;
use crate::intake::{self, IntakeDecision, RejectReason};
use crate::notification::{failure_notice, relayed_ack, reminder_text};
use crate::report::{summarize, ReportSummary};
use crate::state::AppState;
use crate::types::{EventFile, InboundEvent, JobId};

/// Downloads the bytes of an attached file.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, file: &EventFile) -> Result<Vec<u8>, RelayError>;
}

/// Posts a text message to a channel.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> Result<(), RelayError>;
}

/// What happened to one inbound event.
#[derive(Debug)]
pub enum EventOutcome {
    /// Silently filtered out by the intake gate.
    Ignored(RejectReason),
    /// Filtered out, and the sender was told why.
    Notified(String),
    /// Summary delivered to the recipient.
    Relayed(ReportSummary),
    /// Accepted but failed before the summary was delivered.
    Failed(RelayError),
}

pub struct Relay {
    state: Arc<AppState>,
    fetcher: Arc<dyn FileFetcher>,
    extractor: Arc<dyn TextExtractor>,
    sink: Arc<dyn MessageSink>,
}

impl Relay {
    pub fn new(
        state: Arc<AppState>,
        fetcher: Arc<dyn FileFetcher>,
        extractor: Arc<dyn TextExtractor>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            state,
            fetcher,
            extractor,
            sink,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Process one inbound event at time `now`.
    ///
    /// Failures are reported to the sender here; the returned outcome is for
    /// logging and tests.
    pub async fn handle_event(&self, event: &InboundEvent, now: DateTime<Utc>) -> EventOutcome {
        let local_now = now.with_timezone(&self.state.timezone);

        let file = match intake::evaluate(event, &self.state.intake_policy, &local_now) {
            IntakeDecision::FilteredOut(reason) => {
                log::debug!("Ignoring message {} in {}: {}", event.ts, event.channel, reason);
                return EventOutcome::Ignored(reason);
            }
            IntakeDecision::FilteredOutNotified { notice } => {
                log::info!(
                    "Report in {} arrived outside the allowed day, notifying sender",
                    event.channel
                );
                self.notify_sender(&event.channel, &notice).await;
                return EventOutcome::Notified(notice);
            }
            IntakeDecision::Accepted(file) => file,
        };

        log::info!("Processing report {} ({})", file.name, file.id);

        match self.relay_report(&file, now).await {
            Ok(summary) => {
                log::info!(
                    "Relayed {} to {}: {}",
                    file.name,
                    self.state.config.recipient_channel,
                    summary.message
                );
                self.notify_sender(&event.channel, &relayed_ack(&summary.message))
                    .await;
                EventOutcome::Relayed(summary)
            }
            Err(err) => {
                match &err {
                    RelayError::Delivery(_) => log::error!("Failed to relay {}: {}", file.name, err),
                    _ => log::warn!("Could not process {}: {}", file.name, err),
                }
                if err.notifies_sender() {
                    self.notify_sender(&event.channel, &failure_notice(&file.name, &err))
                        .await;
                }
                EventOutcome::Failed(err)
            }
        }
    }

    /// Download, parse and deliver one accepted report. The tracker is only
    /// marked once the recipient has the summary.
    async fn relay_report(
        &self,
        file: &EventFile,
        now: DateTime<Utc>,
    ) -> Result<ReportSummary, RelayError> {
        let bytes = self.fetcher.fetch(file).await?;
        let text = self.extractor.extract(&bytes, file)?;
        let summary = summarize(&text, &self.state.config.employee_name, &file.name)?;

        self.sink
            .send(&self.state.config.recipient_channel, &summary.message)
            .await
            .map_err(|e| match e {
                RelayError::Delivery(msg) => RelayError::Delivery(msg),
                other => RelayError::Delivery(other.to_string()),
            })?;

        self.state.tracker.mark_received(now);
        Ok(summary)
    }

    /// Best-effort message back to the sender. Failures are only logged.
    async fn notify_sender(&self, channel: &str, text: &str) {
        if let Err(e) = self.sink.send(channel, text).await {
            log::warn!("Failed to send notice to {}: {}", channel, e);
        }
    }

    /// Send the reminder if no report has been relayed this period.
    ///
    /// Returns whether a reminder was sent.
    pub async fn check_deadline(&self) -> Result<bool, RelayError> {
        if self.state.tracker.is_satisfied() {
            log::info!("Deadline check: report already received this week");
            return Ok(false);
        }

        let destination = self.state.config.reminder_destination();
        log::info!("Deadline check: no report yet, reminding {}", destination);
        self.sink
            .send(destination, &reminder_text(&self.state.config.employee_name))
            .await?;
        Ok(true)
    }

    /// Start a new tracking period.
    pub fn reset_week(&self) {
        let previous = self.state.tracker.snapshot();
        self.state.tracker.reset();
        log::info!(
            "Weekly reset: tracker cleared (previous report at {:?})",
            previous.last_received_at
        );
    }

    /// Run a scheduled job.
    pub async fn run_job(&self, job: JobId) -> Result<(), RelayError> {
        match job {
            JobId::DeadlineCheck => self.check_deadline().await.map(|_| ()),
            JobId::WeeklyReset => {
                self.reset_week();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DocumentExtractor;
    use crate::intake::PDF_MIME_TYPE;
    use crate::parser::ParseError;
    use crate::tracker::TrackerStatus;
    use crate::types::{ChannelType, RelayConfig};
    use chrono::TimeZone;
    use parking_lot::Mutex;

    const SAMPLE_REPORT: &str =
        "Summary Report\n01/05/2024 - 01/11/2024\nTOTAL HOURS: 5:45:10\nClient work 5:45:10\n";

    struct FakeFetcher {
        result: Result<Vec<u8>, String>,
    }

    #[async_trait]
    impl FileFetcher for FakeFetcher {
        async fn fetch(&self, _file: &EventFile) -> Result<Vec<u8>, RelayError> {
            self.result.clone().map_err(RelayError::Retrieval)
        }
    }

    /// Treats the downloaded bytes as the extracted text.
    struct PassthroughExtractor;

    impl TextExtractor for PassthroughExtractor {
        fn extract(
            &self,
            bytes: &[u8],
            _file: &EventFile,
        ) -> Result<String, crate::extract::ExtractError> {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail_channel: Option<String>,
    }

    impl RecordingSink {
        fn failing_on(channel: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_channel: Some(channel.to_string()),
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, channel: &str, text: &str) -> Result<(), RelayError> {
            if self.fail_channel.as_deref() == Some(channel) {
                return Err(RelayError::Delivery("channel_not_found".to_string()));
            }
            self.sent.lock().push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn config() -> RelayConfig {
        RelayConfig {
            slack_bot_token: "xoxb-test".to_string(),
            intake_channel: "D_EMPLOYEE".to_string(),
            recipient_channel: "D_MANAGER".to_string(),
            ..RelayConfig::default()
        }
    }

    fn relay_with(
        config: RelayConfig,
        fetched: Result<Vec<u8>, String>,
        sink: Arc<RecordingSink>,
    ) -> Relay {
        let state = Arc::new(AppState::new(config).unwrap());
        Relay::new(
            state,
            Arc::new(FakeFetcher { result: fetched }),
            Arc::new(PassthroughExtractor),
            sink,
        )
    }

    fn report_event(name: &str) -> InboundEvent {
        InboundEvent {
            channel: "D_EMPLOYEE".to_string(),
            channel_type: ChannelType::DirectMessage,
            user: Some("U_ROXIE".to_string()),
            ts: "1705089600.000200".to_string(),
            files: vec![EventFile {
                id: "F1".to_string(),
                name: name.to_string(),
                mime_type: PDF_MIME_TYPE.to_string(),
                url: "https://files.slack.com/F1".to_string(),
            }],
        }
    }

    // Friday 2024-01-12, 15:00 in New York.
    fn friday_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 12, 20, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_relay() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(config(), Ok(SAMPLE_REPORT.as_bytes().to_vec()), sink.clone());

        let outcome = relay
            .handle_event(&report_event("Toggl_Summary_2024.pdf"), friday_afternoon())
            .await;

        let expected = "Roxie's time for week of 01/05/2024 - 01/11/2024: *5 hours 45 minutes*";
        match outcome {
            EventOutcome::Relayed(summary) => assert_eq!(summary.message, expected),
            other => panic!("expected Relayed, got {:?}", other),
        }

        let sent = sink.sent();
        assert_eq!(sent[0], ("D_MANAGER".to_string(), expected.to_string()));
        assert_eq!(sent[1].0, "D_EMPLOYEE");
        assert!(sent[1].1.contains(expected));

        let tracker = relay.state().tracker.snapshot();
        assert_eq!(tracker.status(), TrackerStatus::Satisfied);
        assert_eq!(tracker.last_received_at, Some(friday_afternoon()));
    }

    #[tokio::test]
    async fn test_unrelated_upload_is_silent() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(config(), Ok(Vec::new()), sink.clone());

        let outcome = relay
            .handle_event(&report_event("invoice.pdf"), friday_afternoon())
            .await;

        assert!(matches!(
            outcome,
            EventOutcome::Ignored(RejectReason::UnrecognizedFilename)
        ));
        assert!(sink.sent().is_empty());
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
    }

    #[tokio::test]
    async fn test_restricted_day_notifies_sender_only() {
        let mut cfg = config();
        cfg.restrict_to_deadline_day = true;
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(cfg, Ok(SAMPLE_REPORT.as_bytes().to_vec()), sink.clone());

        // Wednesday 2024-01-10 in New York
        let wednesday = Utc.with_ymd_and_hms(2024, 1, 10, 18, 0, 0).unwrap();
        let outcome = relay
            .handle_event(&report_event("Toggl_Summary_2024.pdf"), wednesday)
            .await;

        assert!(matches!(outcome, EventOutcome::Notified(_)));
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "D_EMPLOYEE");
        assert!(sent[0].1.contains("Friday"));
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
    }

    #[tokio::test]
    async fn test_parse_failure_notifies_sender() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(config(), Ok(b"Detailed report, no totals".to_vec()), sink.clone());

        let outcome = relay
            .handle_event(&report_event("Toggl_Track_Detailed.pdf"), friday_afternoon())
            .await;

        assert!(matches!(
            outcome,
            EventOutcome::Failed(RelayError::Parse(ParseError::MarkerNotFound))
        ));
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "D_EMPLOYEE");
        assert!(sent[0].1.contains("total duration marker not found"));
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
    }

    #[tokio::test]
    async fn test_retrieval_failure_notifies_sender() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(config(), Err("HTTP 404 Not Found".to_string()), sink.clone());

        let outcome = relay
            .handle_event(&report_event("Toggl_Summary_2024.pdf"), friday_afternoon())
            .await;

        assert!(matches!(outcome, EventOutcome::Failed(RelayError::Retrieval(_))));
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("HTTP 404 Not Found"));
    }

    #[tokio::test]
    async fn test_extraction_failure_with_real_extractor() {
        let sink = Arc::new(RecordingSink::default());
        let state = Arc::new(AppState::new(config()).unwrap());
        let relay = Relay::new(
            state,
            Arc::new(FakeFetcher {
                result: Ok(b"<html>Sign in to Slack</html>".to_vec()),
            }),
            Arc::new(DocumentExtractor),
            sink.clone(),
        );

        let outcome = relay
            .handle_event(&report_event("Toggl_Summary_2024.pdf"), friday_afternoon())
            .await;

        assert!(matches!(outcome, EventOutcome::Failed(RelayError::Extraction(_))));
        assert_eq!(sink.sent().len(), 1);
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
    }

    /// Records the metadata it was handed and returns a fixed text.
    struct MetadataCheckingExtractor {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl TextExtractor for MetadataCheckingExtractor {
        fn extract(
            &self,
            _bytes: &[u8],
            file: &EventFile,
        ) -> Result<String, crate::extract::ExtractError> {
            self.seen
                .lock()
                .push((file.name.clone(), file.mime_type.clone()));
            Ok(SAMPLE_REPORT.to_string())
        }
    }

    #[tokio::test]
    async fn test_pdf_without_extension_is_relayed() {
        let sink = Arc::new(RecordingSink::default());
        let extractor = Arc::new(MetadataCheckingExtractor {
            seen: Mutex::new(Vec::new()),
        });
        let state = Arc::new(AppState::new(config()).unwrap());
        let relay = Relay::new(
            state,
            Arc::new(FakeFetcher {
                result: Ok(b"%PDF-1.4".to_vec()),
            }),
            extractor.clone(),
            sink.clone(),
        );

        let outcome = relay
            .handle_event(&report_event("Toggl Track Summary"), friday_afternoon())
            .await;

        assert!(matches!(outcome, EventOutcome::Relayed(_)));
        assert_eq!(
            *extractor.seen.lock(),
            vec![("Toggl Track Summary".to_string(), PDF_MIME_TYPE.to_string())]
        );
        assert_eq!(sink.sent()[0].0, "D_MANAGER");
    }

    #[tokio::test]
    async fn test_pdf_without_extension_reaches_pdf_reader() {
        let sink = Arc::new(RecordingSink::default());
        let state = Arc::new(AppState::new(config()).unwrap());
        let relay = Relay::new(
            state,
            Arc::new(FakeFetcher {
                result: Ok(b"%PDF-1.4 TOTAL HOURS: 5:45:10".to_vec()),
            }),
            Arc::new(DocumentExtractor),
            sink.clone(),
        );

        let outcome = relay
            .handle_event(&report_event("Toggl Track Summary"), friday_afternoon())
            .await;

        match outcome {
            EventOutcome::Failed(RelayError::Extraction(msg)) => {
                assert!(!msg.contains("Unsupported format"), "got: {}", msg);
            }
            other => panic!("expected an extraction failure, got {:?}", other),
        }
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].1.contains("Unsupported format"));
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_tracker_pending() {
        let sink = Arc::new(RecordingSink::failing_on("D_MANAGER"));
        let relay = relay_with(config(), Ok(SAMPLE_REPORT.as_bytes().to_vec()), sink.clone());

        let outcome = relay
            .handle_event(&report_event("Toggl_Summary_2024.pdf"), friday_afternoon())
            .await;

        assert!(matches!(outcome, EventOutcome::Failed(RelayError::Delivery(_))));
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "D_EMPLOYEE");
        assert!(sent[0].1.contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_sender_notice_failure_is_not_escalated() {
        let sink = Arc::new(RecordingSink::failing_on("D_EMPLOYEE"));
        let relay = relay_with(config(), Ok(SAMPLE_REPORT.as_bytes().to_vec()), sink.clone());

        let outcome = relay
            .handle_event(&report_event("Toggl_Summary_2024.pdf"), friday_afternoon())
            .await;

        // The acknowledgement could not be posted, but the relay itself succeeded.
        assert!(matches!(outcome, EventOutcome::Relayed(_)));
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Satisfied);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_reminder_only_when_pending() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(config(), Ok(Vec::new()), sink.clone());

        assert!(relay.check_deadline().await.unwrap());
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "D_EMPLOYEE");
        assert!(sent[0].1.contains("Roxie"));

        relay.state().tracker.mark_received(friday_afternoon());
        assert!(!relay.check_deadline().await.unwrap());
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_uses_reminder_channel() {
        let mut cfg = config();
        cfg.reminder_channel = Some("C_TEAM".to_string());
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(cfg, Ok(Vec::new()), sink.clone());

        relay.run_job(JobId::DeadlineCheck).await.unwrap();
        assert_eq!(sink.sent()[0].0, "C_TEAM");
    }

    #[tokio::test]
    async fn test_reminder_delivery_failure_is_returned() {
        let sink = Arc::new(RecordingSink::failing_on("D_EMPLOYEE"));
        let relay = relay_with(config(), Ok(Vec::new()), sink);
        assert!(matches!(
            relay.check_deadline().await,
            Err(RelayError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn test_weekly_reset_job() {
        let sink = Arc::new(RecordingSink::default());
        let relay = relay_with(config(), Ok(Vec::new()), sink);

        relay.state().tracker.mark_received(friday_afternoon());
        relay.run_job(JobId::WeeklyReset).await.unwrap();
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
        relay.run_job(JobId::WeeklyReset).await.unwrap();
        assert_eq!(relay.state().tracker.status(), TrackerStatus::Pending);
    }
}
